//! Tests for the function coverage engine
//!
//! Grouped per subsystem. Each test states one observable property of
//! discovery, classification or reporting.

#![allow(clippy::redundant_clone, clippy::float_cmp)]

use super::*;
use crate::config::{FuncCovConfig, ReportKind};
use crate::reflect::CallableKind;
use crate::result::FuncCovError;
use crate::runtime::{
    Attribute, Binding, CallArgs, CallError, ClassObject, Frame, FunctionId, FunctionObject,
    ModuleObject, Value,
};
use std::sync::{Arc, OnceLock};

const TEST_MODULE: &str = "tests.test_shapes";

fn test_frame(name: &str) -> Frame {
    Frame::test(name, TEST_MODULE)
}

fn record(module: &str, qualname: &str) -> CallableRecord {
    CallableRecord::new(
        FunctionId::next(),
        qualname,
        CallableKind::Function,
        Origin {
            module: module.to_string(),
            ..Origin::default()
        },
    )
}

/// `pkg.shapes`: two functions where `outer` calls `helper`, a class with
/// one callable of each method kind plus a nested class, an import and a
/// plain value.
struct Fixture {
    module: ModuleObject,
    helper: FunctionObject,
    outer: FunctionObject,
    shape: ClassObject,
}

fn fixture() -> Fixture {
    let helper = FunctionObject::new("pkg.shapes", "helper", |_| Ok(Value::from(1_i64)));
    let inner = helper.clone();
    let outer = FunctionObject::new("pkg.shapes", "outer", move |args| {
        let n = inner.call(args)?.as_i64().unwrap_or(0);
        Ok(Value::from(n + 1))
    });
    let nested = ClassObject::builder("pkg.shapes", "Shape.Corner")
        .method("angle", |_| Ok(Value::from(90_i64)))
        .build();
    let shape = ClassObject::builder("pkg.shapes", "Shape")
        .method("describe", |_| Ok(Value::from("shape")))
        .classmethod("create", |args| match args.get(0) {
            Some(Value::Class(class)) => class.instantiate(CallArgs::new()),
            _ => Err(CallError::type_error("create() needs a class")),
        })
        .staticmethod("unit", |_| Ok(Value::from(1_i64)))
        .attr("Corner", Attribute::Class(nested))
        .attr("SIDES", Attribute::Value(Value::from(4_i64)))
        .build();
    let imported = FunctionObject::new("pkg.other", "imported", |_| Ok(Value::None));
    let module = ModuleObject::builder("pkg.shapes")
        .file("pkg/shapes.py")
        .function(helper.clone())
        .function(outer.clone())
        .class(shape.clone())
        .function(imported)
        .bind("VERSION", Binding::Value(Value::from("1.0")))
        .build();
    Fixture {
        module,
        helper,
        outer,
        shape,
    }
}

fn ready_session(config: FuncCovConfig, modules: &[&ModuleObject]) -> Session {
    let session = Session::new(config).unwrap();
    session.begin_discovery().unwrap();
    for module in modules {
        let _ = session.discover_module(module).unwrap();
    }
    session.on_collect_module(TEST_MODULE).unwrap();
    session.on_collection_finish().unwrap();
    session
}

// ============================================================================
// Registry
// ============================================================================

mod registry_tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent_by_identity() {
        let registry = Registry::new();
        let first = record("pkg.a", "f");
        let id = first.id();
        assert!(registry.register(first));
        let duplicate = CallableRecord::new(id, "alias", CallableKind::Function, Origin::default());
        assert!(!registry.register(duplicate));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(id).unwrap().qualname(), "f");
    }

    #[test]
    fn test_new_records_start_untested() {
        let registry = Registry::new();
        let r = record("pkg.a", "f");
        let id = r.id();
        let _ = registry.register(r);
        assert!(!registry.get(id).unwrap().is_tested());
        assert_eq!(registry.tested_count(), 0);
    }

    #[test]
    fn test_mark_tested_is_monotonic() {
        let registry = Registry::new();
        let r = record("pkg.a", "f");
        let id = r.id();
        let _ = registry.register(r);

        assert!(registry.mark_tested(id, "test_one"));
        assert!(!registry.mark_tested(id, "test_two"));
        assert!(!registry.mark_tested(id, "test_one"));

        let stored = registry.get(id).unwrap();
        assert!(stored.is_tested());
        assert_eq!(stored.direct_callers(), vec!["test_one", "test_two"]);
    }

    #[test]
    fn test_mark_unknown_identity_is_ignored() {
        let registry = Registry::new();
        let _ = registry.register(record("pkg.a", "f"));
        assert!(!registry.mark_tested(FunctionId::next(), "test_x"));
        assert_eq!(registry.tested_count(), 0);
    }

    #[test]
    fn test_records_keep_registration_order() {
        let registry = Registry::new();
        for name in ["c", "a", "b"] {
            let _ = registry.register(record("pkg.m", name));
        }
        let names: Vec<_> = registry
            .records()
            .iter()
            .map(|r| r.qualname().to_string())
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
        assert!(registry.find("pkg.m.a").is_some());
        assert!(registry.find("pkg.m.z").is_none());
    }

    #[test]
    fn test_concurrent_marks_flip_once() {
        let registry = Registry::new();
        let r = record("pkg.a", "f");
        let id = r.id();
        let _ = registry.register(r);

        let flips: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let registry = &registry;
                    scope.spawn(move || usize::from(registry.mark_tested(id, &format!("test_{i}"))))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(flips, 1);
        assert_eq!(registry.get(id).unwrap().direct_callers().len(), 8);
    }
}

// ============================================================================
// Classifier
// ============================================================================

mod classifier_tests {
    use super::*;

    fn setup() -> (Arc<Registry>, FunctionId) {
        let registry = Arc::new(Registry::new());
        let r = record("pkg.a", "target");
        let id = r.id();
        let _ = registry.register(r);
        (registry, id)
    }

    #[test]
    fn test_direct_test_call_marks() {
        let (registry, id) = setup();
        let classifier = Classifier::new(registry.clone(), Box::new(NamePrefix::default()));
        let attribution = classifier.record(id, Some(&test_frame("test_target")));
        assert_eq!(attribution, Attribution::DirectFromTest);
        assert!(registry.get(id).unwrap().is_tested());
    }

    #[test]
    fn test_no_caller_is_not_a_test_call() {
        let (registry, id) = setup();
        let classifier = Classifier::new(registry.clone(), Box::new(NamePrefix::default()));
        assert_eq!(classifier.record(id, None), Attribution::NoCaller);
        assert!(!registry.get(id).unwrap().is_tested());
    }

    #[test]
    fn test_non_test_caller_ignored() {
        let (registry, id) = setup();
        let classifier = Classifier::new(registry.clone(), Box::new(NamePrefix::default()));
        let frame = Frame::test("setup_module", TEST_MODULE);
        assert_eq!(classifier.record(id, Some(&frame)), Attribution::NotATest);
        assert!(!registry.get(id).unwrap().is_tested());
    }

    #[test]
    fn test_tracked_caller_never_counts() {
        let (registry, id) = setup();
        let tracked = record("pkg.a", "test_looking_helper");
        let tracked_id = tracked.id();
        let _ = registry.register(tracked);

        let classifier = Classifier::new(registry.clone(), Box::new(NamePrefix::default()));
        let frame = Frame::function(tracked_id, Arc::from("test_looking_helper"), Arc::from("pkg.a"));
        assert_eq!(classifier.record(id, Some(&frame)), Attribution::CallerTracked);
        assert!(!registry.get(id).unwrap().is_tested());
    }

    #[test]
    fn test_untracked_function_frame_named_like_test_counts() {
        let (registry, id) = setup();
        let classifier = Classifier::new(registry.clone(), Box::new(NamePrefix::default()));
        let frame = Frame::function(FunctionId::next(), Arc::from("test_fn"), Arc::from(TEST_MODULE));
        assert_eq!(classifier.record(id, Some(&frame)), Attribution::DirectFromTest);
    }

    #[test]
    fn test_collected_origin_restriction() {
        let (registry, id) = setup();
        let classifier = Classifier::new(registry.clone(), Box::new(NamePrefix::default()))
            .require_collected_origin(true);
        let frame = test_frame("test_target");

        assert_eq!(classifier.classify(Some(&frame)), Attribution::UncollectedOrigin);
        classifier.collect_module(TEST_MODULE);
        assert!(classifier.is_collected(TEST_MODULE));
        assert_eq!(classifier.record(id, Some(&frame)), Attribution::DirectFromTest);
        assert!(registry.get(id).unwrap().is_tested());
    }

    #[test]
    fn test_closure_predicate() {
        let (registry, id) = setup();
        let predicate = |frame: &Frame| frame.name.ends_with("_spec");
        let classifier = Classifier::new(registry.clone(), Box::new(predicate));
        assert_eq!(classifier.classify(Some(&test_frame("test_x"))), Attribution::NotATest);
        assert_eq!(
            classifier.record(id, Some(&test_frame("area_spec"))),
            Attribution::DirectFromTest
        );
    }

    #[test]
    fn test_custom_prefix() {
        let (registry, _) = setup();
        let classifier = Classifier::new(registry, Box::new(NamePrefix::new("check")));
        assert_eq!(
            classifier.classify(Some(&test_frame("check_area"))),
            Attribution::DirectFromTest
        );
        assert_eq!(classifier.classify(Some(&test_frame("test_area"))), Attribution::NotATest);
    }
}

// ============================================================================
// Discovery
// ============================================================================

mod discovery_tests {
    use super::*;

    fn discovered_names(found: &[Discovered]) -> Vec<(String, CallableKind)> {
        found
            .iter()
            .map(|d| (d.function.qualname().to_string(), d.kind))
            .collect()
    }

    #[test]
    fn test_discovers_every_defined_callable_kind() {
        let fx = fixture();
        let ignore = IgnorePatterns::default();
        let found = Discovery::new(&ignore).discover_module(&fx.module);
        assert_eq!(
            discovered_names(&found),
            vec![
                ("helper".to_string(), CallableKind::Function),
                ("outer".to_string(), CallableKind::Function),
                ("Shape.describe".to_string(), CallableKind::Method),
                ("Shape.create".to_string(), CallableKind::ClassMethod),
                ("Shape.unit".to_string(), CallableKind::StaticMethod),
                ("Shape.Corner.angle".to_string(), CallableKind::Method),
            ]
        );
    }

    #[test]
    fn test_origin_carries_module_and_path() {
        let fx = fixture();
        let ignore = IgnorePatterns::default();
        let found = Discovery::new(&ignore).discover_module(&fx.module);
        assert!(found.iter().all(|d| d.origin.module == "pkg.shapes"));
        assert!(found
            .iter()
            .all(|d| d.origin.path.as_deref() == Some(std::path::Path::new("pkg/shapes.py"))));
    }

    #[test]
    fn test_ignore_matches_unqualified_name() {
        let module = ModuleObject::builder("pkg.naming")
            .def("test_helper", |_| Ok(Value::None))
            .def("helper_test", |_| Ok(Value::None))
            .class(
                ClassObject::builder("pkg.naming", "test_Suite")
                    .method("test_method", |_| Ok(Value::None))
                    .method("run", |_| Ok(Value::None))
                    .build(),
            )
            .build();
        let ignore = IgnorePatterns::new(["^test_"]).unwrap();
        let found = Discovery::new(&ignore).discover_module(&module);
        let names: Vec<_> = found.iter().map(|d| d.function.qualname()).collect();
        assert_eq!(names, vec!["helper_test", "test_Suite.run"]);
    }

    #[test]
    fn test_alias_reported_once() {
        let f = FunctionObject::new("pkg.alias", "original", |_| Ok(Value::None));
        let module = ModuleObject::builder("pkg.alias")
            .function(f.clone())
            .bind("alias", Binding::Function(f.clone()))
            .build();
        let ignore = IgnorePatterns::default();
        let found = Discovery::new(&ignore).discover_module(&module);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].function.id(), f.id());
    }

    #[test]
    fn test_empty_module() {
        let module = ModuleObject::builder("pkg.empty").build();
        let ignore = IgnorePatterns::default();
        assert!(Discovery::new(&ignore).discover_module(&module).is_empty());
    }

    #[test]
    fn test_class_attribute_bound_to_foreign_function_not_counted() {
        let helper = FunctionObject::new("pkg.other", "helper", |_| Ok(Value::None));
        let other = ModuleObject::builder("pkg.other")
            .function(helper.clone())
            .build();
        let class = ClassObject::builder("pkg.a", "C")
            .method("run", |_| Ok(Value::None))
            .attr("helper", Attribute::Function(helper))
            .build();
        let module = ModuleObject::builder("pkg.a").class(class).build();

        let session = Session::new(FuncCovConfig::default()).unwrap();
        session.begin_discovery().unwrap();
        assert_eq!(session.discover_module(&module).unwrap(), 1);
        assert_eq!(session.discover_module(&other).unwrap(), 1);

        let registry = session.registry();
        assert!(registry.find("pkg.a.helper").is_none());
        assert!(registry.find("pkg.a.C.run").is_some());
        let record = registry.find("pkg.other.helper").unwrap();
        assert_eq!(record.kind(), CallableKind::Function);
        assert_eq!(record.origin().module, "pkg.other");
    }

    #[test]
    fn test_discover_package_keeps_going_after_load_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().join("pkg");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("__init__.py"), "").unwrap();
        std::fs::write(root.join("broken.py"), "").unwrap();
        std::fs::write(root.join("shapes.py"), "").unwrap();

        let loader = MemoryLoader::new()
            .with_module(ModuleObject::builder("pkg").build())
            .with_module(fixture().module);
        let ignore = IgnorePatterns::default();
        let result = Discovery::new(&ignore)
            .discover_package(&root, &ModuleLayout::default(), &loader)
            .unwrap();

        assert_eq!(result.modules.len(), 2);
        assert_eq!(result.callables.len(), 6);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].module, "pkg.broken");
        assert_eq!(result.warnings[0].message, "No module named 'pkg.broken'");
    }

    #[test]
    fn test_discover_package_fills_missing_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().join("lib");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("util.py"), "").unwrap();

        let loader = MemoryLoader::new().with_module(
            ModuleObject::builder("lib.util")
                .def("slugify", |_| Ok(Value::None))
                .build(),
        );
        let ignore = IgnorePatterns::default();
        let result = Discovery::new(&ignore)
            .discover_package(&root, &ModuleLayout::default(), &loader)
            .unwrap();
        assert_eq!(result.callables[0].origin.path, Some(root.join("util.py")));
    }
}

// ============================================================================
// Instrumentation
// ============================================================================

mod instrument_tests {
    use super::*;

    fn instrumenter() -> (Arc<Registry>, Instrumenter) {
        let registry = Arc::new(Registry::new());
        let classifier = Arc::new(Classifier::new(registry.clone(), Box::new(NamePrefix::default())));
        (registry, Instrumenter::new(classifier))
    }

    #[test]
    fn test_install_once() {
        let (_, instrumenter) = instrumenter();
        let f = FunctionObject::new("pkg.a", "f", |_| Ok(Value::None));
        assert_eq!(instrumenter.instrument(&f).unwrap(), Instrumented::Installed);
        assert_eq!(instrumenter.instrument(&f).unwrap(), Instrumented::AlreadyInstalled);
        assert_eq!(instrumenter.installed_count(), 1);
        assert!(f.is_instrumented());
    }

    #[test]
    fn test_native_function_rejected() {
        let (_, instrumenter) = instrumenter();
        let f = FunctionObject::builder("builtins", "len", |_| Ok(Value::None))
            .native()
            .build();
        let err = instrumenter.instrument(&f).unwrap_err();
        assert!(matches!(err, FuncCovError::Instrumentation { ref name, .. } if name == "builtins.len"));
        assert!(!f.is_instrumented());
    }

    #[test]
    fn test_foreign_observer_rejected() {
        let (_, first) = instrumenter();
        let (_, second) = instrumenter();
        let f = FunctionObject::new("pkg.a", "f", |_| Ok(Value::None));
        let _ = first.instrument(&f).unwrap();
        assert!(second.instrument(&f).is_err());
        assert_eq!(second.uninstall_all(), 0);
        assert!(f.is_instrumented());
    }

    #[test]
    fn test_uninstall_restores() {
        let (_, instrumenter) = instrumenter();
        let f = FunctionObject::new("pkg.a", "f", |_| Ok(Value::None));
        let g = FunctionObject::new("pkg.a", "g", |_| Ok(Value::None));
        let _ = instrumenter.instrument(&f).unwrap();
        let _ = instrumenter.instrument(&g).unwrap();
        assert_eq!(instrumenter.uninstall_all(), 2);
        assert!(!f.is_instrumented());
        assert!(!g.is_instrumented());
        assert_eq!(instrumenter.installed_count(), 0);
    }

    #[test]
    fn test_errors_pass_through_unchanged() {
        let (_, instrumenter) = instrumenter();
        let f = FunctionObject::new("pkg.a", "fails", |_| {
            Err(CallError::new("ValueError", "bad input"))
        });
        let _ = instrumenter.instrument(&f).unwrap();
        let err = f.call(CallArgs::new()).unwrap_err();
        assert_eq!(err, CallError::new("ValueError", "bad input"));
    }
}

// ============================================================================
// Session
// ============================================================================

mod session_tests {
    use super::*;

    #[test]
    fn test_lifecycle_states() {
        let fx = fixture();
        let session = Session::new(FuncCovConfig::default()).unwrap();
        assert_eq!(session.state(), SessionState::Uninitialized);
        session.begin_discovery().unwrap();
        assert_eq!(session.state(), SessionState::Discovering);
        let _ = session.discover_module(&fx.module).unwrap();
        session.on_collection_finish().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        {
            let _scope = session.on_test_call(&TestItem::new("test_a", TEST_MODULE)).unwrap();
            assert_eq!(session.state(), SessionState::Executing);
        }
        let _ = session.on_session_finish().unwrap();
        assert_eq!(session.state(), SessionState::Finalized);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let fx = fixture();
        let session = Session::new(FuncCovConfig::default()).unwrap();
        assert!(matches!(
            session.discover_module(&fx.module),
            Err(FuncCovError::InvalidState { .. })
        ));
        assert!(session.on_collection_finish().is_err());
        assert!(session.on_test_call(&TestItem::new("test_a", TEST_MODULE)).is_err());
        assert!(session.on_session_finish().is_err());

        session.begin_discovery().unwrap();
        assert!(session.begin_discovery().is_err());
        session.on_collection_finish().unwrap();
        assert!(session.discover_module(&fx.module).is_err());
    }

    #[test]
    fn test_snapshot_only_after_finalize() {
        let session = ready_session(FuncCovConfig::default(), &[]);
        assert!(matches!(session.snapshot(), Err(FuncCovError::InvalidState { .. })));
        let finished = session.on_session_finish().unwrap();
        assert_eq!(session.snapshot().unwrap(), finished);
        assert!(session.on_session_finish().is_err());
    }

    #[test]
    fn test_discovery_idempotent() {
        let fx = fixture();
        let session = Session::new(FuncCovConfig::default()).unwrap();
        session.begin_discovery().unwrap();
        assert_eq!(session.discover_module(&fx.module).unwrap(), 6);
        assert_eq!(session.discover_module(&fx.module).unwrap(), 0);
        assert_eq!(session.registry().len(), 6);
    }

    #[test]
    fn test_only_immediate_caller_counts() {
        let fx = fixture();
        let session = ready_session(FuncCovConfig::default(), &[&fx.module]);
        {
            let _scope = session.on_test_call(&TestItem::new("test_outer", TEST_MODULE)).unwrap();
            assert_eq!(fx.outer.call(CallArgs::new()).unwrap().as_i64(), Some(2));
        }
        let snapshot = session.on_session_finish().unwrap();
        assert_eq!(snapshot.is_tested("pkg.shapes.outer"), Some(true));
        assert_eq!(snapshot.is_tested("pkg.shapes.helper"), Some(false));
        assert_eq!(
            snapshot.get("pkg.shapes.outer").unwrap().direct_callers,
            vec!["test_outer"]
        );
    }

    #[test]
    fn test_recursive_call_counts_once_and_unwinds() {
        let cell: Arc<OnceLock<FunctionObject>> = Arc::new(OnceLock::new());
        let me = Arc::clone(&cell);
        let fact = FunctionObject::new("pkg.math", "fact", move |args| {
            let n = args.get(0).and_then(Value::as_i64).unwrap_or(0);
            if n <= 1 {
                return Ok(Value::from(1_i64));
            }
            let inner = me.get().ok_or_else(|| CallError::type_error("fact is unbound"))?;
            let rest = inner.call(CallArgs::positional([n - 1]))?.as_i64().unwrap_or(0);
            Ok(Value::from(n * rest))
        });
        let _ = cell.set(fact.clone());
        let module = ModuleObject::builder("pkg.math").function(fact.clone()).build();
        let session = ready_session(FuncCovConfig::default(), &[&module]);

        let outside = crate::runtime::frames::depth();
        {
            let _scope = session.on_test_call(&TestItem::new("test_fact", TEST_MODULE)).unwrap();
            let inside = crate::runtime::frames::depth();
            assert_eq!(fact.call(CallArgs::positional([5_i64])).unwrap().as_i64(), Some(120));
            assert_eq!(crate::runtime::frames::depth(), inside);
        }
        assert_eq!(crate::runtime::frames::depth(), outside);

        let snapshot = session.on_session_finish().unwrap();
        let record = snapshot.get("pkg.math.fact").unwrap();
        assert!(record.tested);
        assert_eq!(record.direct_callers, vec!["test_fact"]);
    }

    #[test]
    fn test_methods_marked_through_every_access_path() {
        let fx = fixture();
        let session = ready_session(FuncCovConfig::default(), &[&fx.module]);
        {
            let _scope = session.on_test_call(&TestItem::new("test_shape", TEST_MODULE)).unwrap();
            let created = fx.shape.call_attr("create", CallArgs::new()).unwrap();
            let instance = created.as_instance().unwrap();
            assert_eq!(instance.call_method("describe", CallArgs::new()).unwrap().as_str(), Some("shape"));
            assert_eq!(instance.call_method("unit", CallArgs::new()).unwrap().as_i64(), Some(1));
        }
        let snapshot = session.on_session_finish().unwrap();
        assert_eq!(snapshot.is_tested("pkg.shapes.Shape.create"), Some(true));
        assert_eq!(snapshot.is_tested("pkg.shapes.Shape.describe"), Some(true));
        assert_eq!(snapshot.is_tested("pkg.shapes.Shape.unit"), Some(true));
        assert_eq!(snapshot.is_tested("pkg.shapes.Shape.Corner.angle"), Some(false));
    }

    #[test]
    fn test_calls_outside_tests_do_not_count() {
        let fx = fixture();
        let session = ready_session(FuncCovConfig::default(), &[&fx.module]);
        let _ = fx.helper.call(CallArgs::new()).unwrap();
        assert_eq!(session.totals().called, 0);
    }

    #[test]
    fn test_uncollected_test_module_ignored_by_default() {
        let fx = fixture();
        let session = ready_session(FuncCovConfig::default(), &[&fx.module]);
        {
            let _scope = session
                .on_test_call(&TestItem::new("test_helper", "tests.not_collected"))
                .unwrap();
            let _ = fx.helper.call(CallArgs::new()).unwrap();
        }
        assert_eq!(session.totals().called, 0);
    }

    #[test]
    fn test_collected_origin_can_be_disabled() {
        let fx = fixture();
        let config = FuncCovConfig::builder().require_collected_origin(false).build();
        let session = ready_session(config, &[&fx.module]);
        {
            let _scope = session
                .on_test_call(&TestItem::new("test_helper", "tests.not_collected"))
                .unwrap();
            let _ = fx.helper.call(CallArgs::new()).unwrap();
        }
        assert_eq!(session.totals().called, 1);
    }

    #[test]
    fn test_native_function_omitted() {
        let module = ModuleObject::builder("pkg.ext")
            .function(
                FunctionObject::builder("pkg.ext", "fast_sum", |_| Ok(Value::None))
                    .native()
                    .build(),
            )
            .def("slow_sum", |_| Ok(Value::None))
            .build();
        let session = Session::new(FuncCovConfig::default()).unwrap();
        session.begin_discovery().unwrap();
        assert_eq!(session.discover_module(&module).unwrap(), 1);
        assert!(session.registry().find("pkg.ext.fast_sum").is_none());
        assert!(session.registry().find("pkg.ext.slow_sum").is_some());
    }

    #[test]
    fn test_hooks_removed_on_finish_and_drop() {
        let fx = fixture();
        let session = ready_session(FuncCovConfig::default(), &[&fx.module]);
        assert!(fx.helper.is_instrumented());
        let _ = session.on_session_finish().unwrap();
        assert!(!fx.helper.is_instrumented());

        let other = fixture();
        {
            let _session = ready_session(FuncCovConfig::default(), &[&other.module]);
            assert!(other.outer.is_instrumented());
        }
        assert!(!other.outer.is_instrumented());
    }

    #[test]
    fn test_sessions_are_independent() {
        let fx = fixture();
        let first = ready_session(FuncCovConfig::default(), &[&fx.module]);
        {
            let _scope = first.on_test_call(&TestItem::new("test_helper", TEST_MODULE)).unwrap();
            let _ = fx.helper.call(CallArgs::new()).unwrap();
        }
        let first_snapshot = first.on_session_finish().unwrap();

        let second = ready_session(FuncCovConfig::default(), &[&fx.module]);
        let second_snapshot = second.on_session_finish().unwrap();

        assert_eq!(first_snapshot.totals.called, 1);
        assert_eq!(second_snapshot.totals.called, 0);
        assert_eq!(second_snapshot.totals.found, 6);
    }

    #[test]
    fn test_on_collection_start_walks_configured_sources() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().join("pkg");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("shapes.py"), "").unwrap();
        std::fs::write(root.join("missing.py"), "").unwrap();

        let loader = MemoryLoader::new().with_module(fixture().module);
        let config = FuncCovConfig::builder().source("pkg").build();
        let session = Session::new(config).unwrap();
        assert_eq!(session.on_collection_start(tmp.path(), &loader).unwrap(), 6);
        assert_eq!(session.state(), SessionState::Discovering);
        assert_eq!(session.warnings().len(), 1);
        assert_eq!(session.warnings()[0].module, "pkg.missing");
    }

    #[test]
    fn test_missing_source_root_is_discovery_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = FuncCovConfig::builder().source("absent").build();
        let session = Session::new(config).unwrap();
        let err = session
            .on_collection_start(tmp.path(), &MemoryLoader::new())
            .unwrap_err();
        assert!(matches!(err, FuncCovError::Discovery { .. }));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = FuncCovConfig::builder().ignore("[").build();
        assert!(matches!(
            Session::new(config),
            Err(FuncCovError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_render_configured_reports() {
        let fx = fixture();
        let config = FuncCovConfig::builder()
            .report([ReportKind::TermMissing])
            .build();
        let session = ready_session(config, &[&fx.module]);
        let _ = session.on_session_finish().unwrap();
        let out = session.render(None).unwrap();
        assert!(out.contains("Missing"));
        assert!(out.contains("Shape.Corner.angle"));
    }
}

// ============================================================================
// Reporting
// ============================================================================

mod report_tests {
    use super::*;

    fn snapshot(tested: &[(&str, &str, bool)]) -> Snapshot {
        let registry = Registry::new();
        for (module, name, is_tested) in tested {
            let r = record(module, name);
            let id = r.id();
            let _ = registry.register(r);
            if *is_tested {
                let _ = registry.mark_tested(id, "test_it");
            }
        }
        Snapshot::from_records(&registry.records())
    }

    #[test]
    fn test_totals_percentage() {
        assert_eq!(Totals::new(5, 2).percentage, 40.0);
        assert_eq!(Totals::new(10, 5).percentage, 50.0);
        assert_eq!(Totals::new(3, 1).percentage, 33.3);
        assert_eq!(Totals::new(3, 2).percentage, 66.7);
        assert_eq!(Totals::new(0, 0).percentage, 0.0);
        assert_eq!(Totals::new(4, 1).missed(), 3);
    }

    #[test]
    fn test_modules_grouped_in_discovery_order() {
        let snap = snapshot(&[
            ("pkg.b", "f", true),
            ("pkg.a", "g", false),
            ("pkg.b", "h", false),
        ]);
        let modules: Vec<_> = snap.modules.iter().map(|m| m.module.as_str()).collect();
        assert_eq!(modules, vec!["pkg.b", "pkg.a"]);
        assert_eq!(snap.modules[0].totals.found, 2);
        assert_eq!(snap.modules[0].totals.called, 1);
        assert_eq!(snap.modules[0].missed, vec!["h"]);
        assert_eq!(snap.totals.found, 3);
        assert_eq!(snap.totals.percentage, 33.3);
    }

    #[test]
    fn test_terminal_table() {
        let snap = snapshot(&[("pkg.m", "f", true), ("pkg.m", "g", false)]);
        let out = TerminalReport::new().render(&snap);
        let lines: Vec<_> = out.lines().collect();
        assert!(lines[0].contains("funcov"));
        assert!(lines[1].starts_with("Name"));
        assert!(lines[1].contains("Funcs"));
        assert!(!lines[1].contains("Missing"));
        assert!(lines[3].starts_with("pkg.m"));
        assert!(lines[3].ends_with("50.0%"));
        assert!(lines[5].starts_with("TOTAL"));
    }

    #[test]
    fn test_terminal_missing_column() {
        let snap = snapshot(&[("pkg.m", "f", false), ("pkg.m", "g", false)]);
        let out = TerminalReport::new().with_missing(true).render(&snap);
        assert!(out.contains("Missing"));
        assert!(out.contains("f, g"));
    }

    #[test]
    fn test_terminal_paths_relative_to_base() {
        let registry = Registry::new();
        let _ = registry.register(CallableRecord::new(
            FunctionId::next(),
            "f",
            CallableKind::Function,
            Origin {
                module: "pkg.m".to_string(),
                path: Some("/work/pkg/m.py".into()),
                line: Some(1),
            },
        ));
        let snap = Snapshot::from_records(&registry.records());
        let out = TerminalReport::new().with_base_dir("/work").render(&snap);
        assert!(out.lines().any(|l| l.starts_with("pkg/m.py")));
    }

    #[test]
    fn test_empty_snapshot_renders_zero() {
        let snap = snapshot(&[]);
        let out = TerminalReport::new().render(&snap);
        assert!(out.lines().last().unwrap().ends_with("0.0%"));
    }

    #[test]
    fn test_json_report_parses_back() {
        let snap = snapshot(&[("pkg.m", "f", true)]);
        let json = snap.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["totals"]["percentage"], 100.0);
        assert_eq!(value["records"][0]["kind"], "function");
        assert_eq!(value["records"][0]["direct_callers"][0], "test_it");
        let parsed: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snap);
    }

    #[test]
    fn test_render_reports_concatenates() {
        let snap = snapshot(&[("pkg.m", "f", true)]);
        let out = render_reports(&[ReportKind::Term, ReportKind::Json], &snap, None).unwrap();
        assert!(out.contains("TOTAL"));
        assert!(out.contains("\"qualified_name\": \"pkg.m.f\""));
    }
}

// ============================================================================
// Properties
// ============================================================================

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_percentage_bounded(found in 0usize..10_000, ratio in 0.0f64..=1.0) {
            let called = (found as f64 * ratio) as usize;
            let totals = Totals::new(found, called);
            prop_assert!((0.0..=100.0).contains(&totals.percentage));
            prop_assert_eq!(totals.missed(), found - called);
            if found > 0 {
                let exact = 100.0 * called as f64 / found as f64;
                prop_assert!((totals.percentage - exact).abs() <= 0.05 + 1e-9);
            }
        }

        #[test]
        fn prop_instrumentation_is_transparent(a in any::<i32>(), b in any::<i32>()) {
            let add = FunctionObject::new("pkg.math", "add", |args| {
                let x = args.get(0).and_then(Value::as_i64).unwrap_or(0);
                let y = args.get(1).and_then(Value::as_i64).unwrap_or(0);
                Ok(Value::from(x + y))
            });
            let args = || CallArgs::positional([i64::from(a), i64::from(b)]);
            let plain = add.call(args()).unwrap();

            let module = ModuleObject::builder("pkg.math").function(add.clone()).build();
            let session = ready_session(FuncCovConfig::default(), &[&module]);
            let instrumented = {
                let _scope = session.on_test_call(&TestItem::new("test_add", TEST_MODULE)).unwrap();
                add.call(args()).unwrap()
            };
            prop_assert_eq!(plain, instrumented);
            prop_assert_eq!(session.totals().called, 1);
        }

        #[test]
        fn prop_tested_flag_is_monotonic(calls in proptest::collection::vec(any::<bool>(), 0..32)) {
            let registry = Arc::new(Registry::new());
            let r = record("pkg.a", "f");
            let id = r.id();
            let _ = registry.register(r);
            let classifier = Classifier::new(registry.clone(), Box::new(NamePrefix::default()));

            let mut seen_test = false;
            for from_test in calls {
                let frame = if from_test { test_frame("test_f") } else { test_frame("helper") };
                let _ = classifier.record(id, Some(&frame));
                seen_test |= from_test;
                prop_assert_eq!(registry.get(id).unwrap().is_tested(), seen_test);
            }
        }
    }
}
