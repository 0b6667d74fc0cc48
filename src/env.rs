use std::{cell::RefCell, ffi::OsStr};

#[derive(Clone, Copy, Debug, Default)]
struct Env {
    trace_enabled: bool,
    max_cycles: Option<u64>,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

/// Read `LMC_TRACE` and `LMC_MAX_CYCLES` from the process environment.
pub fn init() {
    let value = Env {
        trace_enabled: var_is("LMC_TRACE", "1"),
        max_cycles: var_parse("LMC_MAX_CYCLES"),
    };
    set_env(value);
}

/// Print every executed cycle.
pub fn is_trace_enabled() -> bool {
    with_env(|env| env.trace_enabled)
}

/// Cycle cap used when none is given on the command line.
pub fn max_cycles() -> Option<u64> {
    with_env(|env| env.max_cycles)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(&env)
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}

fn var_parse(name: impl AsRef<OsStr>) -> Option<u64> {
    std::env::var(name.as_ref())
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .filter(|&limit| limit > 0)
}
