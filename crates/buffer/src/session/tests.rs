use std::sync::Arc;

use bufsync_rpc::Autocmd;
use bufsync_rpc::fake::FakeHost;
use pretty_assertions::assert_eq;

use super::*;
use crate::Error;

fn registry() -> SessionRegistry {
	SessionRegistry::new(Config::default())
}

#[tokio::test]
async fn first_ensure_registers_every_routine_and_teardown_hook() {
	let host = FakeHost::new();
	let registry = registry();
	let session = SessionId::new("alpha");

	let state = registry.ensure(&host, &session).await.unwrap();

	assert_eq!(state.suffix().len(), 32);
	assert!(state.suffix().chars().all(|c| c.is_ascii_hexdigit()));
	assert_eq!(host.count(&format!("command:{DEFINE_ROUTINE}")), RoutineKind::ALL.len());

	let group = state.session_group();
	let hooks = host.group(&group).expect("teardown group defined");
	assert_eq!(hooks.len(), 1);
	assert_eq!(hooks[0].event, HookEvent::User);
	assert_eq!(hooks[0].pattern, HookPattern::Name("BufsyncSessionTeardown:alpha".into()));
	assert!(hooks[0].once);
	assert_eq!(state.groups(), vec![group]);
}

#[tokio::test]
async fn repeat_ensure_is_memoized_and_silent() {
	let host = FakeHost::new();
	let registry = registry();
	let session = SessionId::new("alpha");

	let first = registry.ensure(&host, &session).await.unwrap();
	let log_len = host.log().len();
	let second = registry.ensure(&host, &session).await.unwrap();

	assert!(Arc::ptr_eq(&first, &second));
	assert_eq!(host.log().len(), log_len);
}

#[tokio::test]
async fn distinct_sessions_get_distinct_names() {
	let host = FakeHost::new();
	let registry = registry();

	let a = registry.ensure(&host, &SessionId::new("a")).await.unwrap();
	let b = registry.ensure(&host, &SessionId::new("b")).await.unwrap();

	assert_ne!(a.suffix(), b.suffix());
	for kind in RoutineKind::ALL {
		assert_ne!(a.routines().name(kind), b.routines().name(kind));
	}
}

#[tokio::test]
async fn concurrent_first_calls_register_once() {
	let host = FakeHost::new();
	let registry = registry();
	let session = SessionId::new("racy");

	let (a, b) = tokio::join!(registry.ensure(&host, &session), registry.ensure(&host, &session));

	assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
	assert_eq!(host.count(&format!("command:{DEFINE_ROUTINE}")), RoutineKind::ALL.len());
}

#[tokio::test]
async fn failed_registration_is_not_memoized() {
	let host = FakeHost::new();
	let registry = registry();
	let session = SessionId::new("flaky");

	host.fail_next("augroup", "E216: No such group");
	assert!(registry.ensure(&host, &session).await.is_err());
	assert!(registry.get(&session).is_none());

	assert!(registry.ensure(&host, &session).await.is_ok());
}

#[test]
fn routine_names_follow_prefix_and_suffix() {
	let routines = Routines::new("Prefix", "abc");
	assert_eq!(routines.name(RoutineKind::Replace), "PrefixReplace_abc");
	assert_eq!(routines.name(RoutineKind::ConcreteStore), "PrefixConcreteStore_abc");
	assert_eq!(routines.kind_of("PrefixTeardown_abc"), Some(RoutineKind::Teardown));
	assert_eq!(routines.kind_of("PrefixTeardown_xyz"), None);
	assert_eq!(routines.iter().count(), RoutineKind::ALL.len());
}

#[tokio::test]
async fn teardown_releases_groups_routines_and_state() {
	let host = FakeHost::new();
	let registry = registry();
	let session = SessionId::new("done");
	let state = registry.ensure(&host, &session).await.unwrap();

	let extra = state.concrete_group(Bufnr(7));
	host.define_group(&extra, Vec::new()).await.unwrap();
	state.track_group(extra);
	state.store_snapshot(
		Bufnr(7),
		ConcreteSnapshot {
			filetype: "text".into(),
			content: vec!["x".into()],
		},
	);
	state.mark_reload_pending(Bufnr(8));

	registry.teardown(&host, &session).await.unwrap();

	assert!(registry.get(&session).is_none());
	assert!(host.groups().is_empty());
	assert_eq!(host.count(&format!("command:{UNDEFINE_ROUTINE}")), RoutineKind::ALL.len());
	assert!(state.snapshot(Bufnr(7)).is_none());
	assert!(!state.is_reload_pending(Bufnr(8)));
	assert!(state.groups().is_empty());
}

#[tokio::test]
async fn teardown_of_unknown_session_is_a_no_op() {
	let host = FakeHost::new();
	registry().teardown(&host, &SessionId::new("ghost")).await.unwrap();
	assert!(host.log().is_empty());
}

#[tokio::test]
async fn custom_config_shapes_names() {
	let host = FakeHost::new();
	let config = Config::parse("routine_prefix = \"Plug\"\ngroup_prefix = \"plug\"\nteardown_event = \"PlugEnd\"").unwrap();
	let registry = SessionRegistry::new(config);
	let state = registry.ensure(&host, &SessionId::new("s")).await.unwrap();

	assert!(state.routines().name(RoutineKind::Open).starts_with("PlugOpen_"));
	assert!(state.session_group().starts_with("plug_session_"));
	assert!(host.fire_user("PlugEnd:s").len() == 1);
}

#[tokio::test]
async fn failed_registration_releases_defined_routines() {
	let host = FakeHost::new();
	let registry = registry();
	let session = SessionId::new("orphans");

	host.fail_next("augroup", "E216: No such group");
	let err = registry.ensure(&host, &session).await.unwrap_err();

	assert!(matches!(err, Error::Host(_)));
	assert_eq!(host.count(&format!("command:{UNDEFINE_ROUTINE}")), RoutineKind::ALL.len());
	assert!(host.groups().is_empty());

	registry.ensure(&host, &session).await.unwrap();
	let defined = host.count(&format!("command:{DEFINE_ROUTINE}"));
	let undefined = host.count(&format!("command:{UNDEFINE_ROUTINE}"));
	assert_eq!(defined - undefined, RoutineKind::ALL.len());
}

#[tokio::test]
async fn partial_registration_releases_only_what_was_defined() {
	let host = FakeHost::new();
	let registry = registry();

	host.fail_after("command:call", 3, "E117: Unknown function: bufsync#define");
	registry.ensure(&host, &SessionId::new("partial")).await.unwrap_err();

	assert_eq!(host.count(&format!("command:{DEFINE_ROUTINE}")), 4);
	assert_eq!(host.count(&format!("command:{UNDEFINE_ROUTINE}")), 3);
}

#[tokio::test]
async fn failed_release_keeps_the_registration_error() {
	let host = FakeHost::new();
	let registry = registry();

	host.fail_next("augroup", "E216: No such group");
	host.fail_after("command:call", RoutineKind::ALL.len(), "E117: Unknown function: bufsync#undefine");
	let err = registry.ensure(&host, &SessionId::new("stuck")).await.unwrap_err();

	let Error::Restore { source, primary } = err else {
		panic!("expected a restoration error, got {err:?}");
	};
	assert!(matches!(*source, Error::Host(_)));
	assert!(matches!(primary.as_deref(), Some(Error::Host(_))));
	assert_eq!(host.count(&format!("command:{UNDEFINE_ROUTINE}")), RoutineKind::ALL.len());
}

#[tokio::test]
async fn each_configured_dispatch_script_is_loaded() {
	let default_host = FakeHost::new();
	registry().ensure(&default_host, &SessionId::new("default-script")).await.unwrap();

	let custom_host = FakeHost::new();
	let config = Config::parse("dispatch_script = \"runtime autoload/bufsync_alt.vim\"").unwrap();
	SessionRegistry::new(config)
		.ensure(&custom_host, &SessionId::new("custom-script"))
		.await
		.unwrap();

	assert_eq!(custom_host.count("command:runtime autoload/bufsync_alt.vim"), 1);
	assert!(loader::is_loaded("runtime autoload/bufsync_alt.vim").await);
	assert!(loader::is_loaded(&Config::default().dispatch_script).await);
}

#[test]
fn every_kind_has_its_own_name() {
	let routines = Routines::new("P", "s");
	for kind in RoutineKind::ALL {
		let name = routines.name(kind);
		assert!(name.starts_with('P') && name.ends_with("_s"), "{name}");
		assert_eq!(routines.kind_of(name), Some(kind));
	}
}
