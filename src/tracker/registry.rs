use std::{
    any::Any,
    collections::HashMap,
    sync::{Arc, Mutex, RwLock, Weak},
};

use log::warn;

use crate::tracker::{
    report::{self, DumpEntry},
    trace, LineSink, ObjectIdentity, OutputConfig, OutputKind,
};

/// Reverse lookup entry of a live registered object.
struct TrackedObject {
    target: Weak<dyn Any + Send + Sync>,
    type_name: String,
    number: u32,
}

/// One not-yet-disposed instance of a type.
struct Undisposed {
    number: u32,
    trace: String,
}

/// All tracking state, guarded by one lock.
#[derive(Default)]
struct RegistryState {
    /// Last number handed out per type
    registrations: HashMap<String, u32>,
    /// Allocation address of every registered object
    objects: HashMap<usize, TrackedObject>,
    /// Outstanding instances per type, in type discovery order
    undisposed: Vec<(String, Vec<Undisposed>)>,
}

impl RegistryState {
    fn lookup(&self, identity: &ObjectIdentity) -> Option<&TrackedObject> {
        self.objects.get(&identity.address()).filter(|tracked| {
            tracked.target.strong_count() > 0 && identity.is_alive()
        })
    }

    fn next_number(&mut self, type_name: &str) -> u32 {
        let counter = self
            .registrations
            .entry(type_name.to_string())
            .or_insert(0);
        *counter += 1;
        *counter
    }

    fn undisposed_of(&mut self, type_name: &str) -> &mut Vec<Undisposed> {
        let index = match self.undisposed.iter().position(|(name, _)| name == type_name) {
            Some(index) => index,
            None => {
                self.undisposed.push((type_name.to_string(), Vec::new()));
                self.undisposed.len() - 1
            }
        };
        &mut self.undisposed[index].1
    }

    fn remove_undisposed(&mut self, type_name: &str, number: u32) {
        let Some(index) = self.undisposed.iter().position(|(name, _)| name == type_name) else {
            return;
        };

        let entries = &mut self.undisposed[index].1;
        if let Some(position) = entries.iter().position(|entry| entry.number == number) {
            entries.remove(position);
        }
        if entries.is_empty() {
            self.undisposed.remove(index);
        }
    }
}

/// Snapshot of the output configuration taken at the start of an operation.
struct Output {
    kind: OutputKind,
    with_trace: bool,
    sink: Arc<dyn LineSink>,
}

/// Thread-safe registry of live disposable objects.
///
/// Instrumented constructors call [`DisposeRegistry::register`], instrumented dispose
/// methods call [`DisposeRegistry::unregister`]. Every registered object receives a
/// sequence number that is unique per type within an epoch (the time between two
/// [`DisposeRegistry::reset`] calls); objects that are still registered are reported by
/// [`DisposeRegistry::dump`] as undisposed.
///
/// The registry never fails and never panics into the host: anomalies such as disposing an
/// object that was never registered are written to the sink as error lines.
///
/// # Thread Safety
///
/// All tracking state lives behind a single [`Mutex`]; the output configuration lives
/// behind a separate [`RwLock`] so it can be changed while other threads register objects.
/// Lines belonging to one operation are written while the state lock is held and are never
/// interleaved with lines of another operation. Poisoned locks are recovered.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use disposetrack::tracker::{BufferSink, DisposeRegistry, ObjectIdentity};
///
/// struct Resource;
///
/// let output = BufferSink::new();
/// let registry = DisposeRegistry::new();
/// registry.set_sink(Arc::new(output.clone()));
///
/// let leaked = Arc::new(Resource);
/// let disposed = Arc::new(Resource);
/// registry.register(&ObjectIdentity::with_type_name(&leaked, "App.Resource"));
/// registry.register(&ObjectIdentity::with_type_name(&disposed, "App.Resource"));
/// registry.unregister(&ObjectIdentity::with_type_name(&disposed, "App.Resource"));
///
/// assert_eq!(
///     output.contents(),
///     "*** Creating App.Resource 1\n\
///      *** Creating App.Resource 2\n\
///      *** Disposing App.Resource 2\n\
///      **** Undisposed Object Dump:\n\
///      \tApp.Resource: 1\n"
/// );
/// ```
pub struct DisposeRegistry {
    state: Mutex<RegistryState>,
    config: RwLock<OutputConfig>,
}

impl DisposeRegistry {
    /// Creates an empty registry with the default output configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(OutputConfig::default())
    }

    /// Creates an empty registry with the given output configuration.
    #[must_use]
    pub fn with_config(config: OutputConfig) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            config: RwLock::new(config),
        }
    }

    fn output(&self) -> Output {
        let config = read_lock!(self.config);
        Output {
            kind: config.kind,
            with_trace: config.track_creation_trace,
            sink: config.sink.clone(),
        }
    }

    /// Records a newly constructed object.
    ///
    /// Assigns the next sequence number of the object's type, starting at 1, and remembers
    /// the object as undisposed. Emits `*** Creating <type> <n>` when registration output is
    /// enabled.
    ///
    /// Registering an object that is already registered and alive leaves the state
    /// unchanged and emits `Creating <type>: Error: Object was already registered`.
    /// Registering an identity whose object was dropped leaves the state unchanged and
    /// emits `Creating <type>: Error: Object is no longer alive`.
    pub fn register(&self, identity: &ObjectIdentity) {
        let output = self.output();
        let mut state = lock!(self.state);

        let type_name = identity.type_name();
        if !identity.is_alive() {
            warn!("Registration of dropped {type_name}");
            output.sink.write_line(&report::no_longer_alive(type_name));
            return;
        }
        if state.lookup(identity).is_some() {
            warn!("Duplicate registration of {type_name}");
            output.sink.write_line(&report::already_registered(type_name));
            return;
        }

        let number = state.next_number(type_name);
        let trace = if output.with_trace {
            trace::capture()
        } else {
            String::new()
        };

        state.objects.insert(
            identity.address(),
            TrackedObject {
                target: identity.downgrade(),
                type_name: type_name.to_string(),
                number,
            },
        );
        state
            .undisposed_of(type_name)
            .push(Undisposed { number, trace });

        if output.kind.contains(OutputKind::REGISTRATION) {
            output.sink.write_line(&report::creating(type_name, number));
        }
    }

    /// Records the disposal of an object and dumps the remaining undisposed objects.
    ///
    /// If the object is not registered, emits
    /// `Disposing <type>: Error: Object was not registered` and changes nothing. Otherwise
    /// emits `*** Disposing <type> <n>` (when registration output is enabled), forgets the
    /// object and then dumps, all under one lock acquisition.
    pub fn unregister(&self, identity: &ObjectIdentity) {
        let output = self.output();
        let mut state = lock!(self.state);

        let Some(tracked) = state.lookup(identity) else {
            warn!("Disposal of unregistered {}", identity.type_name());
            output
                .sink
                .write_line(&report::not_registered(identity.type_name()));
            return;
        };
        let type_name = tracked.type_name.clone();
        let number = tracked.number;

        if output.kind.contains(OutputKind::REGISTRATION) {
            output.sink.write_line(&report::disposing(&type_name, number));
        }

        state.objects.remove(&identity.address());
        state.remove_undisposed(&type_name, number);

        Self::write_dump(&state, &output);
    }

    /// Writes the undisposed object dump.
    ///
    /// Does nothing when dump output is disabled.
    pub fn dump(&self) {
        let output = self.output();
        let state = lock!(self.state);
        Self::write_dump(&state, &output);
    }

    fn write_dump(state: &RegistryState, output: &Output) {
        if !output.kind.contains(OutputKind::DUMP) {
            return;
        }

        let outstanding = state.undisposed.iter().map(|(type_name, entries)| {
            (
                type_name.as_str(),
                entries.iter().map(|entry| DumpEntry {
                    number: entry.number,
                    trace: &entry.trace,
                }),
            )
        });
        report::write_dump(output.sink.as_ref(), outstanding, output.with_trace);
    }

    /// Forgets all registrations and restarts numbering; keeps the output configuration.
    pub fn reset(&self) {
        *lock!(self.state) = RegistryState::default();
    }

    /// Snapshot of all undisposed objects as `(type name, numbers)`, in dump order.
    #[must_use]
    pub fn outstanding(&self) -> Vec<(String, Vec<u32>)> {
        lock!(self.state)
            .undisposed
            .iter()
            .map(|(type_name, entries)| {
                (
                    type_name.clone(),
                    entries.iter().map(|entry| entry.number).collect(),
                )
            })
            .collect()
    }

    /// Number of undisposed objects across all types.
    #[must_use]
    pub fn outstanding_count(&self) -> usize {
        lock!(self.state)
            .undisposed
            .iter()
            .map(|(_, entries)| entries.len())
            .sum()
    }

    /// Returns `true` if the object is alive and currently registered.
    #[must_use]
    pub fn is_registered(&self, identity: &ObjectIdentity) -> bool {
        lock!(self.state).lookup(identity).is_some()
    }

    /// Replaces the enabled output channels.
    pub fn set_output_kind(&self, kind: OutputKind) {
        write_lock!(self.config).kind = kind;
    }

    /// Currently enabled output channels.
    #[must_use]
    pub fn output_kind(&self) -> OutputKind {
        read_lock!(self.config).kind
    }

    /// Enables or disables creation trace capture; applies to later registrations.
    pub fn set_track_creation_trace(&self, enabled: bool) {
        write_lock!(self.config).track_creation_trace = enabled;
    }

    /// Returns `true` if creation traces are captured.
    #[must_use]
    pub fn track_creation_trace(&self) -> bool {
        read_lock!(self.config).track_creation_trace
    }

    /// Replaces the output sink.
    pub fn set_sink(&self, sink: Arc<dyn LineSink>) {
        write_lock!(self.config).sink = sink;
    }

    /// The current output sink.
    #[must_use]
    pub fn sink(&self) -> Arc<dyn LineSink> {
        read_lock!(self.config).sink.clone()
    }

    /// Replaces the whole output configuration.
    pub fn set_config(&self, config: OutputConfig) {
        *write_lock!(self.config) = config;
    }
}

impl Default for DisposeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
