//! A session: several machines, their storage volumes, and the shared
//! compile cache and dispatch registry, stepped in lockstep.

use helmscript_common::Value;
use helmscript_compiler::{CompileCache, ScriptCompiler};
use helmscript_vm::{
    Host, Machine, MachineConfig, MachineState, ProcessorId, ProcessorRegistry, QueuedProgram,
    RuntimeError,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// State shared by every machine in the session.
struct SharedState {
    compiler: ScriptCompiler,
    cache: CompileCache,
    registry: ProcessorRegistry,
    /// volume name -> file name -> source text
    volumes: HashMap<String, HashMap<String, String>>,
    /// Host bindings every machine can read; writable ones accept SET.
    bindings: HashMap<String, Value>,
    writable: HashSet<String>,
    fly_by_wire: HashSet<String>,
    output: Vec<String>,
}

impl SharedState {
    /// Fetch-or-compile a file from one volume, going through the
    /// content-addressed cache.
    fn load_from_volume(
        &mut self,
        volume: &str,
        file: &str,
    ) -> Result<Vec<helmscript_common::CodePart>, RuntimeError> {
        let text = self
            .volumes
            .get(volume)
            .and_then(|files| files.get(file))
            .cloned()
            .ok_or_else(|| RuntimeError::LoadFailed {
                message: format!("no file '{}' on volume '{}'", file, volume),
            })?;
        if let Some(parts) = self.cache.get(&text) {
            return Ok(parts.clone());
        }
        let parts = self
            .compiler
            .compile(&text, "program")
            .map_err(|err| RuntimeError::LoadFailed {
                message: format!("{}: {}", file, err),
            })?;
        self.cache.put(&text, parts.clone());
        Ok(parts)
    }
}

/// One machine's window onto the shared state. The volume is the
/// machine's own storage, used for local RUN.
struct MachineHost<'a> {
    shared: &'a mut SharedState,
    volume: &'a str,
}

impl Host for MachineHost<'_> {
    fn binding_get(&self, name: &str) -> Option<Value> {
        self.shared.bindings.get(name).cloned()
    }

    fn binding_set(&mut self, name: &str, value: Value) -> bool {
        if self.shared.writable.contains(name) {
            self.shared.bindings.insert(name.to_string(), value);
            true
        } else {
            false
        }
    }

    fn print(&mut self, text: &str) {
        self.shared.output.push(text.to_string());
    }

    fn toggle_fly_by_wire(&mut self, name: &str, enabled: bool) -> bool {
        if enabled {
            self.shared.fly_by_wire.insert(name.to_string());
        } else {
            self.shared.fly_by_wire.remove(name);
        }
        true
    }

    fn load_program(
        &mut self,
        file: &str,
    ) -> Result<Vec<helmscript_common::CodePart>, RuntimeError> {
        let volume = self.volume.to_string();
        self.shared.load_from_volume(&volume, file)
    }

    fn dispatch_program(&mut self, file: &str, volume: &str) -> Result<(), RuntimeError> {
        // The program text comes from the sender's own volume; the
        // compiled parts travel to the volume owner's mailbox.
        let own = self.volume.to_string();
        let parts = self.shared.load_from_volume(&own, file)?;
        self.shared.registry.run_program_on(
            QueuedProgram {
                name: file.to_string(),
                parts,
            },
            volume,
        )?;
        Ok(())
    }
}

struct Processor {
    id: ProcessorId,
    volume: String,
    machine: Machine,
}

pub struct Session {
    shared: SharedState,
    processors: Vec<Processor>,
    config: MachineConfig,
    time: f64,
}

impl Session {
    pub fn new(config: MachineConfig) -> Session {
        Session {
            shared: SharedState {
                compiler: ScriptCompiler::new(),
                cache: CompileCache::new(),
                registry: ProcessorRegistry::new(),
                volumes: HashMap::new(),
                bindings: HashMap::new(),
                writable: HashSet::new(),
                fly_by_wire: HashSet::new(),
                output: Vec::new(),
            },
            processors: Vec::new(),
            config,
            time: 0.0,
        }
    }

    /// Add a machine owning the named storage volume. Returns its
    /// index within the session.
    pub fn add_processor(&mut self, volume: &str) -> usize {
        let id = self.shared.registry.register();
        self.shared.registry.attach_volume(id, volume);
        self.shared.volumes.entry(volume.to_string()).or_default();
        self.processors.push(Processor {
            id,
            volume: volume.to_string(),
            machine: Machine::new(self.config.clone()),
        });
        self.processors.len() - 1
    }

    pub fn add_file(&mut self, volume: &str, name: &str, text: &str) {
        self.shared
            .volumes
            .entry(volume.to_string())
            .or_default()
            .insert(name.to_string(), text.to_string());
    }

    /// Expose a read-only host binding to every machine.
    pub fn set_binding(&mut self, name: &str, value: Value) {
        self.shared.bindings.insert(name.to_string(), value);
    }

    /// Expose a binding machines may also SET.
    pub fn set_writable_binding(&mut self, name: &str, value: Value) {
        self.shared.bindings.insert(name.to_string(), value);
        self.shared.writable.insert(name.to_string());
    }

    pub fn binding(&self, name: &str) -> Option<&Value> {
        self.shared.bindings.get(name)
    }

    /// Compile a command into one machine's interpreter. Each machine
    /// keeps its own compilation context.
    pub fn interpret(
        &mut self,
        processor: usize,
        text: &str,
    ) -> Result<(), helmscript_compiler::ParseError> {
        let context_id = format!("processor-{}", self.processors[processor].id.0);
        let parts = self.shared.compiler.compile(text, &context_id)?;
        self.processors[processor].machine.append_commands(parts);
        Ok(())
    }

    /// Advance the whole session by `dt` seconds: deliver dispatched
    /// programs, then give every machine one slice at the new time.
    pub fn tick(&mut self, dt: f64) {
        self.time += dt;
        for processor in &mut self.processors {
            for queued in self.shared.registry.take_pending(processor.id) {
                debug!(processor = processor.id.0, program = %queued.name, "delivering dispatched program");
                processor.machine.run_program(queued.name, queued.parts);
            }
            let mut host = MachineHost {
                shared: &mut self.shared,
                volume: &processor.volume,
            };
            processor.machine.tick(&mut host, self.time);
        }
    }

    /// Whether any machine still has main-line work scheduled.
    pub fn busy(&self) -> bool {
        self.processors.iter().any(|processor| {
            !matches!(
                processor.machine.state(),
                MachineState::Idle | MachineState::Halted
            )
        })
    }

    pub fn machine_state(&self, processor: usize) -> &MachineState {
        self.processors[processor].machine.state()
    }

    pub fn drain_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.shared.output)
    }

    pub fn time(&self) -> f64 {
        self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(MachineConfig::default())
    }

    #[test]
    fn single_machine_prints() {
        let mut session = session();
        let cpu = session.add_processor("core");
        session.interpret(cpu, "print \"hello\".").unwrap();
        session.tick(0.02);
        assert_eq!(session.drain_output(), vec!["hello"]);
    }

    #[test]
    fn dispatch_between_machines_leaves_sender_untouched() {
        let mut session = session();
        let alpha = session.add_processor("alpha");
        let beta = session.add_processor("beta");
        session.add_file("alpha", "hail", "print \"hail from alpha\".");

        session
            .interpret(alpha, "run \"hail\" on \"beta\". print \"sent\".")
            .unwrap();
        // Dispatch queues during alpha's slice; beta drains its
        // mailbox at the start of its own slice.
        session.tick(0.02);
        session.tick(0.02);
        let output = session.drain_output();
        assert_eq!(output, vec!["sent", "hail from alpha"]);
        assert_eq!(*session.machine_state(alpha), MachineState::Idle);
        assert_eq!(*session.machine_state(beta), MachineState::Idle);
    }

    #[test]
    fn dispatch_to_unknown_volume_reports() {
        let mut session = session();
        let cpu = session.add_processor("core");
        session.add_file("core", "boot", "print 1.");
        session.interpret(cpu, "run \"boot\" on \"ghost\".").unwrap();
        session.tick(0.02);
        let output = session.drain_output();
        assert_eq!(output.len(), 1);
        assert!(output[0].contains("no machine owns volume 'ghost'"));
    }

    #[test]
    fn cache_shares_compiles_across_machines() {
        let mut session = session();
        let alpha = session.add_processor("alpha");
        let beta = session.add_processor("beta");
        session.add_file("alpha", "boot", "print \"booted\".");
        session.add_file("beta", "boot", "print \"booted\".");
        session.interpret(alpha, "run \"boot\".").unwrap();
        session.interpret(beta, "run \"boot\".").unwrap();
        session.tick(0.02);
        assert_eq!(session.drain_output(), vec!["booted", "booted"]);
        // Identical text resolved to one cache entry.
        assert_eq!(session.shared.cache.len(), 1);
    }

    #[test]
    fn machines_keep_separate_variables() {
        let mut session = session();
        let alpha = session.add_processor("alpha");
        let beta = session.add_processor("beta");
        session.interpret(alpha, "set x to 1. print x.").unwrap();
        session.interpret(beta, "print x.").unwrap();
        session.tick(0.02);
        let output = session.drain_output();
        assert_eq!(output[0], "1");
        assert!(output[1].contains("undefined variable 'x'"));
    }

    #[test]
    fn writable_binding_accepts_set() {
        let mut session = session();
        let cpu = session.add_processor("core");
        session.set_writable_binding("throttle", Value::Scalar(0.0));
        session.interpret(cpu, "set throttle to 0.5.").unwrap();
        session.tick(0.02);
        assert_eq!(session.binding("throttle"), Some(&Value::Scalar(0.5)));
    }

    #[test]
    fn wait_spans_session_ticks() {
        let mut session = session();
        let cpu = session.add_processor("core");
        session.interpret(cpu, "wait 0.05. print \"done\".").unwrap();
        session.tick(0.02);
        session.tick(0.02);
        assert!(session.drain_output().is_empty());
        assert!(session.busy());
        session.tick(0.02);
        assert_eq!(session.drain_output(), vec!["done"]);
        assert!(!session.busy());
    }
}
