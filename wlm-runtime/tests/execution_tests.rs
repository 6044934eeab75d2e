//! Instantiation and execution of text-format fixtures

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use proptest::prelude::*;
use wlm_decoder::decode_module;
use wlm_error::{Error, ErrorKind, Result};
use wlm_format::{FuncType, Limits, MemoryType, TableType, RefType, Value, ValueType};
use wlm_host::HostFunc;
use wlm_runtime::{
    Extern, Imports, InstanceConfig, InstanceCore, Interpreter, Invocation, TrapKind, execute,
};

fn instantiate_with(text: &str, imports: &Imports, config: &InstanceConfig) -> Result<Arc<InstanceCore>> {
    let bytes = wat::parse_str(text).unwrap();
    let module = Arc::new(decode_module(&bytes)?);
    InstanceCore::instantiate(module, imports, config, &Interpreter::new())
}

fn instantiate(text: &str) -> Arc<InstanceCore> {
    instantiate_with(text, &Imports::new(), &InstanceConfig::default()).unwrap()
}

fn call(instance: &Arc<InstanceCore>, name: &str, args: &[Value]) -> Result<Invocation> {
    let index = instance.exported_function(name).unwrap();
    execute(&Interpreter::new(), instance, index, args)
}

fn returned(instance: &Arc<InstanceCore>, name: &str, args: &[Value]) -> Vec<Value> {
    match call(instance, name, args).unwrap() {
        Invocation::Returned(values) => values,
        Invocation::Trapped(trap) => panic!("{name} trapped: {trap}"),
    }
}

fn trap_kind(instance: &Arc<InstanceCore>, name: &str, args: &[Value]) -> TrapKind {
    match call(instance, name, args).unwrap() {
        Invocation::Trapped(trap) => trap.kind,
        Invocation::Returned(values) => panic!("{name} returned {values:?}"),
    }
}

const ARITHMETIC: &str = r#"(module
    (func (export "add") (param i32 i32) (result i32) local.get 0 local.get 1 i32.add)
    (func (export "sub") (param i32 i32) (result i32) local.get 0 local.get 1 i32.sub)
    (func (export "mul") (param i32 i32) (result i32) local.get 0 local.get 1 i32.mul)
    (func (export "div_s") (param i32 i32) (result i32) local.get 0 local.get 1 i32.div_s)
    (func (export "rem_u") (param i32 i32) (result i32) local.get 0 local.get 1 i32.rem_u)
    (func (export "rotl") (param i32 i32) (result i32) local.get 0 local.get 1 i32.rotl)
    (func (export "trunc") (param f64) (result i32) local.get 0 i32.trunc_f64_s)
    (func (export "trunc_sat") (param f64) (result i32) local.get 0 i32.trunc_sat_f64_s)
    (func (export "fmin") (param f64 f64) (result f64) local.get 0 local.get 1 f64.min)
    (func (export "nearest") (param f32) (result f32) local.get 0 f32.nearest)
    (func (export "sext") (param i64) (result i64) local.get 0 i64.extend8_s))"#;

#[test]
fn integer_arithmetic_wraps() {
    let instance = instantiate(ARITHMETIC);
    assert_eq!(returned(&instance, "add", &[Value::I32(i32::MAX), Value::I32(1)]), vec![Value::I32(i32::MIN)]);
    assert_eq!(returned(&instance, "sub", &[Value::I32(0), Value::I32(1)]), vec![Value::I32(-1)]);
    assert_eq!(returned(&instance, "rem_u", &[Value::I32(-1), Value::I32(10)]), vec![Value::I32(5)]);
    assert_eq!(returned(&instance, "rotl", &[Value::I32(1), Value::I32(33)]), vec![Value::I32(2)]);
    assert_eq!(returned(&instance, "sext", &[Value::I64(0x80)]), vec![Value::I64(-128)]);
}

#[test]
fn division_traps_and_instance_stays_usable() {
    let instance = instantiate(ARITHMETIC);
    assert_eq!(trap_kind(&instance, "div_s", &[Value::I32(1), Value::I32(0)]), TrapKind::IntegerDivideByZero);
    assert_eq!(
        trap_kind(&instance, "div_s", &[Value::I32(i32::MIN), Value::I32(-1)]),
        TrapKind::IntegerOverflow
    );
    assert_eq!(returned(&instance, "div_s", &[Value::I32(-7), Value::I32(2)]), vec![Value::I32(-3)]);
    assert_eq!(instance.stats().traps, 2);
    assert_eq!(instance.stats().invocations, 3);
}

#[test]
fn float_semantics_follow_webassembly() {
    let instance = instantiate(ARITHMETIC);
    assert_eq!(trap_kind(&instance, "trunc", &[Value::F64(f64::NAN)]), TrapKind::InvalidConversionToInteger);
    assert_eq!(trap_kind(&instance, "trunc", &[Value::F64(3e9)]), TrapKind::IntegerOverflow);
    assert_eq!(returned(&instance, "trunc", &[Value::F64(-3.9)]), vec![Value::I32(-3)]);
    assert_eq!(returned(&instance, "trunc_sat", &[Value::F64(3e9)]), vec![Value::I32(i32::MAX)]);
    assert_eq!(returned(&instance, "trunc_sat", &[Value::F64(f64::NAN)]), vec![Value::I32(0)]);
    assert_eq!(returned(&instance, "nearest", &[Value::F32(2.5)]), vec![Value::F32(2.0)]);
    match returned(&instance, "fmin", &[Value::F64(0.0), Value::F64(-0.0)])[0] {
        Value::F64(v) => assert!(v == 0.0 && v.is_sign_negative()),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn arguments_are_checked_before_execution() {
    let instance = instantiate(ARITHMETIC);
    assert_eq!(call(&instance, "add", &[Value::I32(1)]).unwrap_err().kind(), ErrorKind::ArityMismatch);
    assert_eq!(
        call(&instance, "add", &[Value::I32(1), Value::F32(1.0)]).unwrap_err().kind(),
        ErrorKind::TypeMismatch
    );
    assert_eq!(instance.stats().invocations, 0);
}

#[test]
fn control_flow_and_recursion() {
    let instance = instantiate(
        r#"(module
            (func $fib (export "fib") (param i32) (result i32)
                local.get 0
                i32.const 2
                i32.lt_u
                if (result i32)
                    local.get 0
                else
                    local.get 0
                    i32.const 1
                    i32.sub
                    call $fib
                    local.get 0
                    i32.const 2
                    i32.sub
                    call $fib
                    i32.add
                end)
            (func (export "sum") (param i32) (result i32) (local i32)
                block
                    loop
                        local.get 0
                        i32.eqz
                        br_if 1
                        local.get 1
                        local.get 0
                        i32.add
                        local.set 1
                        local.get 0
                        i32.const 1
                        i32.sub
                        local.set 0
                        br 0
                    end
                end
                local.get 1)
            (func (export "classify") (param i32) (result i32)
                block
                    block
                        block
                            local.get 0
                            br_table 0 1 2
                        end
                        i32.const 10
                        return
                    end
                    i32.const 20
                    return
                end
                i32.const 30))"#,
    );
    assert_eq!(returned(&instance, "fib", &[Value::I32(15)]), vec![Value::I32(610)]);
    assert_eq!(returned(&instance, "sum", &[Value::I32(100)]), vec![Value::I32(5050)]);
    assert_eq!(returned(&instance, "classify", &[Value::I32(0)]), vec![Value::I32(10)]);
    assert_eq!(returned(&instance, "classify", &[Value::I32(1)]), vec![Value::I32(20)]);
    assert_eq!(returned(&instance, "classify", &[Value::I32(7)]), vec![Value::I32(30)]);
    assert!(instance.stats().max_call_depth >= 14);
}

#[test]
fn memory_access_is_bounds_checked() {
    let instance = instantiate(
        r#"(module
            (memory (export "memory") 1 2)
            (data (i32.const 16) "\2a\00\00\00")
            (func (export "load") (param i32) (result i32) local.get 0 i32.load)
            (func (export "store") (param i32 i32) local.get 0 local.get 1 i32.store)
            (func (export "grow") (param i32) (result i32) local.get 0 memory.grow)
            (func (export "size") (result i32) memory.size))"#,
    );
    assert_eq!(returned(&instance, "load", &[Value::I32(16)]), vec![Value::I32(42)]);
    returned(&instance, "store", &[Value::I32(100), Value::I32(-5)]);
    assert_eq!(returned(&instance, "load", &[Value::I32(100)]), vec![Value::I32(-5)]);
    assert_eq!(trap_kind(&instance, "load", &[Value::I32(65534)]), TrapKind::MemoryOutOfBounds);
    assert_eq!(trap_kind(&instance, "load", &[Value::I32(-1)]), TrapKind::MemoryOutOfBounds);

    assert_eq!(returned(&instance, "grow", &[Value::I32(1)]), vec![Value::I32(1)]);
    assert_eq!(returned(&instance, "grow", &[Value::I32(1)]), vec![Value::I32(-1)]);
    assert_eq!(returned(&instance, "size", &[]), vec![Value::I32(2)]);
    assert_eq!(returned(&instance, "load", &[Value::I32(65534)]), vec![Value::I32(0)]);
}

#[test]
fn indirect_calls_check_null_and_signature() {
    let instance = instantiate(
        r#"(module
            (type $unary (func (param i32) (result i32)))
            (table 3 funcref)
            (func $double (param i32) (result i32) local.get 0 i32.const 2 i32.mul)
            (func $nothing)
            (elem (i32.const 0) $double $nothing)
            (func (export "dispatch") (param i32 i32) (result i32)
                local.get 1
                local.get 0
                call_indirect (type $unary)))"#,
    );
    assert_eq!(returned(&instance, "dispatch", &[Value::I32(0), Value::I32(21)]), vec![Value::I32(42)]);
    assert_eq!(
        trap_kind(&instance, "dispatch", &[Value::I32(1), Value::I32(0)]),
        TrapKind::IndirectCallTypeMismatch
    );
    assert_eq!(trap_kind(&instance, "dispatch", &[Value::I32(2), Value::I32(0)]), TrapKind::IndirectCallToNull);
    assert_eq!(trap_kind(&instance, "dispatch", &[Value::I32(3), Value::I32(0)]), TrapKind::TableOutOfBounds);
}

#[test]
fn trapping_start_function_fails_instantiation() {
    let err = instantiate_with(
        r#"(module (func $boom unreachable) (start $boom))"#,
        &Imports::new(),
        &InstanceConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InstantiationTrap);
    assert!(err.message.contains("unreachable"));
}

#[test]
fn start_function_runs_once_before_exports() {
    let instance = instantiate(
        r#"(module
            (global $g (mut i32) (i32.const 1))
            (func $init global.get $g i32.const 41 i32.add global.set $g)
            (start $init)
            (func (export "get") (result i32) global.get $g))"#,
    );
    assert_eq!(returned(&instance, "get", &[]), vec![Value::I32(42)]);
}

#[test]
fn segments_are_all_or_nothing() {
    let memory = Extern::memory(MemoryType { limits: Limits::new(1, None) }, 16).unwrap();
    let shared = memory.as_memory().unwrap().clone();
    let mut imports = Imports::new();
    imports.define("env", "memory", memory);

    let err = instantiate_with(
        r#"(module
            (import "env" "memory" (memory 1))
            (data (i32.const 0) "ok")
            (data (i32.const 65535) "too long"))"#,
        &imports,
        &InstanceConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LinkError);
    assert_eq!(&shared.lock().data()[..2], &[0, 0]);

    let table = Extern::table(
        TableType {
            element_type: RefType::FuncRef,
            limits:       Limits::new(1, None),
        },
        16,
    )
    .unwrap();
    imports.define("env", "table", table);
    let err = instantiate_with(
        r#"(module
            (import "env" "table" (table 1 funcref))
            (func $f)
            (elem (i32.const 0) $f $f))"#,
        &imports,
        &InstanceConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LinkError);
}

#[test]
fn host_imports_are_called_and_failures_trap() {
    let seen = Arc::new(AtomicU32::new(0));
    let recorder = Arc::clone(&seen);
    let mut imports = Imports::new();
    imports.func(
        "env",
        "record",
        HostFunc::wrap(FuncType::new([ValueType::I32], [ValueType::I32]), move |args: &[Value]| {
            let v = args[0].as_i32().unwrap_or_default();
            recorder.store(v as u32, Ordering::SeqCst);
            Ok(vec![Value::I32(v * 2)])
        }),
    );
    imports.func(
        "env",
        "fail",
        HostFunc::wrap(FuncType::new([], []), |_: &[Value]| Err(Error::resource_limit("disk full"))),
    );
    let instance = instantiate_with(
        r#"(module
            (import "env" "record" (func $record (param i32) (result i32)))
            (import "env" "fail" (func $fail))
            (func (export "run") (result i32) i32.const 21 call $record)
            (func (export "fail") call $fail))"#,
        &imports,
        &InstanceConfig::default(),
    )
    .unwrap();

    assert_eq!(returned(&instance, "run", &[]), vec![Value::I32(42)]);
    assert_eq!(seen.load(Ordering::SeqCst), 21);
    match call(&instance, "fail", &[]).unwrap() {
        Invocation::Trapped(trap) => {
            assert_eq!(trap.kind, TrapKind::Host);
            assert!(trap.message.contains("disk full"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn engine_fault_taints_the_instance() {
    let mut imports = Imports::new();
    imports.func(
        "env",
        "broken",
        HostFunc::wrap(FuncType::new([], [ValueType::I32]), |_: &[Value]| Ok(vec![Value::F64(1.0)])),
    );
    let instance = instantiate_with(
        r#"(module
            (import "env" "broken" (func $broken (result i32)))
            (func (export "run") (result i32) call $broken)
            (func (export "ok") (result i32) i32.const 1))"#,
        &imports,
        &InstanceConfig::default(),
    )
    .unwrap();

    assert_eq!(call(&instance, "run", &[]).unwrap_err().kind(), ErrorKind::EngineFault);
    assert!(instance.is_tainted());
    assert_eq!(call(&instance, "ok", &[]).unwrap_err().kind(), ErrorKind::IllegalState);
}

#[test]
fn exports_of_one_instance_satisfy_imports_of_another() {
    let provider = instantiate(
        r#"(module
            (memory (export "memory") 1)
            (global $n (mut i32) (i32.const 0))
            (func (export "next") (result i32)
                global.get $n
                i32.const 1
                i32.add
                global.set $n
                global.get $n))"#,
    );
    let mut imports = Imports::new();
    imports.instance("provider", &provider);
    let consumer = instantiate_with(
        r#"(module
            (import "provider" "next" (func $next (result i32)))
            (import "provider" "memory" (memory 1))
            (func (export "twice") (result i32)
                call $next
                drop
                i32.const 0
                call $next
                i32.store
                i32.const 0
                i32.load))"#,
        &imports,
        &InstanceConfig::default(),
    )
    .unwrap();

    assert!(consumer.imports_from(&provider));
    assert!(!provider.imports_from(&consumer));
    assert_eq!(returned(&consumer, "twice", &[]), vec![Value::I32(2)]);
    assert_eq!(returned(&provider, "next", &[]), vec![Value::I32(3)]);
    let memory = provider.export("memory").and_then(Extern::as_memory).unwrap();
    assert_eq!(&memory.lock().data()[..4], &[2, 0, 0, 0]);
}

#[test]
fn calls_into_a_retired_instance_are_use_after_free() {
    let provider = instantiate(r#"(module (func (export "f") (result i32) i32.const 1))"#);
    let mut imports = Imports::new();
    imports.instance("p", &provider);
    let consumer = instantiate_with(
        r#"(module (import "p" "f" (func $f (result i32))) (func (export "g") (result i32) call $f))"#,
        &imports,
        &InstanceConfig::default(),
    )
    .unwrap();

    provider.retire();
    assert_eq!(call(&provider, "f", &[]).unwrap_err().kind(), ErrorKind::UseAfterFree);
    assert_eq!(call(&consumer, "g", &[]).unwrap_err().kind(), ErrorKind::UseAfterFree);
    assert!(!consumer.is_tainted());
}

#[test]
fn exports_of_a_retired_instance_cannot_be_imported() {
    let consumer = r#"(module (import "p" "f" (func $f (result i32))) (func (export "g") (result i32) call $f))"#;
    let provider = instantiate(r#"(module (func (export "f") (result i32) i32.const 1))"#);
    let mut imports = Imports::new();
    imports.instance("p", &provider);
    assert!(instantiate_with(consumer, &imports, &InstanceConfig::default()).is_ok());

    provider.retire();
    let err = instantiate_with(consumer, &imports, &InstanceConfig::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UseAfterFree);
    assert!(err.to_string().contains("p.f"));

    drop(provider);
    let err = instantiate_with(consumer, &imports, &InstanceConfig::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UseAfterFree);
}

#[test]
fn budgets_bound_execution() {
    let config = InstanceConfig {
        fuel: Some(10_000),
        max_call_depth: 64,
        ..InstanceConfig::default()
    };
    let instance = instantiate_with(
        r#"(module
            (func (export "spin") (loop br 0))
            (func $down (export "down") call $down)
            (func (export "quick") (result i32) i32.const 7))"#,
        &Imports::new(),
        &config,
    )
    .unwrap();

    assert_eq!(trap_kind(&instance, "spin", &[]), TrapKind::OutOfFuel);
    assert_eq!(trap_kind(&instance, "down", &[]), TrapKind::StackOverflow);
    assert_eq!(returned(&instance, "quick", &[]), vec![Value::I32(7)]);
    assert!(instance.stats().fuel_consumed >= 10_000);
}

#[test]
fn interrupt_stops_a_running_call() {
    let instance = instantiate(r#"(module (func (export "spin") (loop br 0)))"#);
    let runner = {
        let instance = Arc::clone(&instance);
        thread::spawn(move || trap_kind(&instance, "spin", &[]))
    };
    thread::sleep(Duration::from_millis(20));
    instance.request_interrupt();
    assert_eq!(runner.join().unwrap(), TrapKind::Interrupted);
}

#[test]
fn concurrent_calls_are_serialized() {
    let instance = instantiate(
        r#"(module
            (global $count (mut i32) (i32.const 0))
            (func (export "bump") (result i32)
                global.get $count
                i32.const 1
                i32.add
                global.set $count
                global.get $count))"#,
    );
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let instance = Arc::clone(&instance);
            thread::spawn(move || {
                for _ in 0..250 {
                    returned(&instance, "bump", &[]);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(returned(&instance, "bump", &[]), vec![Value::I32(1001)]);
    assert_eq!(instance.stats().invocations, 1001);
}

proptest! {
    #[test]
    fn i32_ops_match_wrapping_arithmetic(a in any::<i32>(), b in any::<i32>()) {
        let instance = instantiate(ARITHMETIC);
        prop_assert_eq!(returned(&instance, "add", &[Value::I32(a), Value::I32(b)]), vec![Value::I32(a.wrapping_add(b))]);
        prop_assert_eq!(returned(&instance, "mul", &[Value::I32(a), Value::I32(b)]), vec![Value::I32(a.wrapping_mul(b))]);
        let kind = match call(&instance, "div_s", &[Value::I32(a), Value::I32(b)]).unwrap() {
            Invocation::Returned(values) => {
                prop_assert_eq!(values, vec![Value::I32(a.wrapping_div(b))]);
                None
            }
            Invocation::Trapped(trap) => Some(trap.kind),
        };
        let expected = if b == 0 {
            Some(TrapKind::IntegerDivideByZero)
        } else if a == i32::MIN && b == -1 {
            Some(TrapKind::IntegerOverflow)
        } else {
            None
        };
        prop_assert_eq!(kind, expected);
    }
}
