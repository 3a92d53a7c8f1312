//! Error & Interrupt Model (§4.7, §5): `Caller`/`Reason`/`Interrupt`/`Break`
//! and the primitives that observe and clear them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::runtime::Runtime;
use crate::value::Value;

/// Shared, `Clone`-able flag an embedding host can flip from a signal
/// handler or another thread to request an interrupt (§5). The engine
/// itself never spawns a thread; this is just the one door left open for a
/// host to knock on it asynchronously.
#[derive(Clone)]
pub struct BreakFlag(Arc<AtomicBool>);

impl BreakFlag {
    pub fn new() -> Self {
        BreakFlag(Arc::new(AtomicBool::new(false)))
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    pub fn peek(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for BreakFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn break_requested(&self) -> bool {
        self.break_flag.peek()
    }

    pub fn clear_break(&mut self) {
        self.break_flag.take();
    }

    /// Let an embedding host (e.g. a SIGINT handler) request a break.
    pub fn request_break(&self) {
        self.break_flag.request();
    }

    pub fn set_caller(&mut self, caller: Value) {
        self.caller = caller;
    }

    /// "Preemptively claim responsibility": the runtime itself, rather than
    /// a Builtin, is to blame (used for missing symbols and recursion caps).
    pub fn set_caller_runtime(&mut self) {
        self.caller = Value::Str(rc_str("a higher power"));
    }

    /// `errstate`: retrieve (Caller, Reason, Interrupt) and clear them.
    pub fn errstate(&mut self) -> (Value, String, bool) {
        let caller = std::mem::replace(&mut self.caller, Value::Str(rc_str("")));
        let reason = std::mem::take(&mut self.reason);
        let interrupt = self.interrupt;
        self.interrupt = false;
        (caller, reason, interrupt)
    }
}

fn rc_str(s: &str) -> std::rc::Rc<str> {
    std::rc::Rc::from(s)
}

/// Wire `SIGINT`/`SIGTERM` to `flag.request()`, so a host process can Ctrl-C
/// out of a runaway evaluation without the engine spawning a thread itself.
#[cfg(unix)]
pub fn install_signal_handler(flag: BreakFlag) -> Result<(), String> {
    let sigint_flag = flag.clone();
    unsafe {
        signal_hook::low_level::register(signal_hook::consts::SIGINT, move || {
            sigint_flag.request();
        })
        .map_err(|e| format!("Could not install SIGINT handler: {e}"))?;
        signal_hook::low_level::register(signal_hook::consts::SIGTERM, move || {
            flag.request();
        })
        .map_err(|e| format!("Could not install SIGTERM handler: {e}"))?;
    }
    Ok(())
}
