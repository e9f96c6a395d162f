//! Host binding
//!
//! [`ObservedValue`] adapts a [`StorageObservation`] to an action-driven host:
//! the host sends [`ObservedAction`]s in through [`ObservedValue::apply`], and
//! the observation's outputs and errors come back out as actions on the feed
//! returned by `Start`.

use tokio::sync::mpsc;

use tidewatch_core::{ObserveError, ObserveResult, Storage, StorageObserver};

use crate::{Clock, ObservationConfig, StorageObservation, TokioClock};

/// Actions understood by an [`ObservedValue`]
#[derive(Clone, Debug, PartialEq)]
pub enum ObservedAction<T> {
    Start,
    Stop,
    Pause,
    Resume,
    Update(T),
    SetError(ObserveError),
    ClearError,
}

/// Actions produced by a running observation, to be fed back into `apply`
pub type ActionFeed<T> = mpsc::UnboundedReceiver<ObservedAction<T>>;

/// Host-side view of an observed output
pub struct ObservedValue<O, S, C = TokioClock>
where
    O: StorageObserver,
    S: Storage<Snapshot = O::Snapshot>,
    C: Clock,
{
    observer: O,
    storage: S,
    clock: C,
    config: ObservationConfig,
    observation: Option<StorageObservation<O, S, C>>,
    output: Option<O::Output>,
    error: Option<ObserveError>,
}

impl<O, S> ObservedValue<O, S, TokioClock>
where
    O: StorageObserver + Clone,
    S: Storage<Snapshot = O::Snapshot> + Clone,
{
    pub fn new(observer: O, storage: S) -> Self {
        Self::with_config(observer, storage, ObservationConfig::default(), TokioClock)
    }
}

impl<O, S, C> ObservedValue<O, S, C>
where
    O: StorageObserver + Clone,
    S: Storage<Snapshot = O::Snapshot> + Clone,
    C: Clock,
{
    pub fn with_config(observer: O, storage: S, config: ObservationConfig, clock: C) -> Self {
        ObservedValue {
            observer,
            storage,
            clock,
            config,
            observation: None,
            output: None,
            error: None,
        }
    }

    /// Latest output, or the observer's initial value before the first one
    pub fn value(&self) -> O::Output {
        match &self.output {
            Some(output) => output.clone(),
            None => self.observer.initial_value(),
        }
    }

    pub fn error(&self) -> Option<&ObserveError> {
        self.error.as_ref()
    }

    pub fn has_started(&self) -> bool {
        self.observation.is_some()
    }

    pub fn observation(&self) -> Option<&StorageObservation<O, S, C>> {
        self.observation.as_ref()
    }

    /// Apply one action
    ///
    /// `Start` returns the feed of `Update`/`SetError` actions; the feed ends
    /// after `Stop`.
    pub fn apply(
        &mut self,
        action: ObservedAction<O::Output>,
    ) -> ObserveResult<Option<ActionFeed<O::Output>>> {
        match action {
            ObservedAction::Start => {
                if self.observation.is_some() {
                    return Err(ObserveError::AlreadyStarted);
                }
                let observation = StorageObservation::with_config(
                    self.observer.clone(),
                    self.storage.clone(),
                    self.config.clone(),
                    self.clock.clone(),
                );
                let feed = forward(&observation);
                self.observation = Some(observation);
                return Ok(Some(feed));
            }
            ObservedAction::Stop => {
                // Dropping the observation finishes both channels
                self.observation.take().ok_or(ObserveError::NotStarted)?;
            }
            ObservedAction::Pause => self.running()?.pause(),
            ObservedAction::Resume => {
                self.running()?.resume_in_background();
            }
            ObservedAction::Update(output) => self.output = Some(output),
            ObservedAction::SetError(error) => self.error = Some(error),
            ObservedAction::ClearError => self.error = None,
        }
        Ok(None)
    }

    fn running(&self) -> ObserveResult<&StorageObservation<O, S, C>> {
        self.observation.as_ref().ok_or(ObserveError::NotStarted)
    }
}

fn forward<O, S, C>(observation: &StorageObservation<O, S, C>) -> ActionFeed<O::Output>
where
    O: StorageObserver,
    S: Storage<Snapshot = O::Snapshot>,
    C: Clock,
{
    let (tx, rx) = mpsc::unbounded_channel();

    let mut outputs = observation.outputs();
    let output_tx = tx.clone();
    tokio::spawn(async move {
        while let Some(output) = outputs.next().await {
            if output_tx.send(ObservedAction::Update(output)).is_err() {
                break;
            }
        }
    });

    let mut errors = observation.errors();
    tokio::spawn(async move {
        while let Some(error) = errors.next().await {
            if tx.send(ObservedAction::SetError(error)).is_err() {
                break;
            }
        }
    });

    rx
}
