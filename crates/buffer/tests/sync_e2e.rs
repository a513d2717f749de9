use std::sync::Arc;

use bufsync::{
	AppendOptions, Buffers, Config, DecodeOptions, Error, FileFormat, OpenOptions, ReplaceOptions, SessionId,
	SessionRegistry,
};
use bufsync_rpc::fake::FakeHost;
use bufsync_rpc::{Callback, HookEvent};
use pretty_assertions::assert_eq;
use serde_json::json;

fn session(name: &str) -> Buffers<FakeHost> {
	let _ = tracing_subscriber::fmt::try_init();
	let registry = Arc::new(SessionRegistry::new(Config::default()));
	Buffers::with_registry(FakeHost::new(), SessionId::new(name), registry)
}

async fn deliver(buffers: &Buffers<FakeHost>, callbacks: Vec<Callback>) {
	for callback in callbacks {
		buffers.deliver(callback).await.unwrap();
	}
}

#[tokio::test]
async fn remote_buffer_lifecycle() {
	let buffers = session("e2e-lifecycle");
	let host = buffers.host();

	let opened = buffers
		.open("scp://host/notes.txt", &OpenOptions::default())
		.await
		.unwrap();
	let bufnr = opened.bufnr;
	assert_eq!(host.current_buffer(), bufnr);

	let decoded = buffers
		.assign(bufnr, b"first\r\nsecond\r\n", &DecodeOptions::default())
		.await
		.unwrap();
	assert_eq!(decoded.fileformat, FileFormat::Dos);
	assert_eq!(host.lines(bufnr), vec!["first", "second"]);
	assert_eq!(host.option(bufnr, "modified"), json!(0));

	host.set_option(bufnr, "filetype", json!("text"));
	buffers.concrete(bufnr).await.unwrap();

	buffers
		.append(bufnr, &["third"], AppendOptions { lnum: Some(2) })
		.await
		.unwrap();
	host.set_lines(bufnr, &["first", "second", "third", "typed"]);
	deliver(&buffers, host.fire(HookEvent::BufWriteCmd, bufnr)).await;
	assert_eq!(host.option(bufnr, "modified"), json!(0));

	buffers.reload(bufnr).await.unwrap();
	deliver(&buffers, host.take_fired()).await;
	assert_eq!(host.lines(bufnr), vec!["first", "second", "third", "typed"]);
	assert_eq!(host.option(bufnr, "filetype"), json!("text"));

	buffers.teardown().await.unwrap();
	assert!(buffers.registry().get(buffers.session()).is_none());
	assert!(host.groups().is_empty());
}

#[tokio::test]
async fn hidden_buffers_reload_when_entered() {
	let buffers = session("e2e-hidden");
	let host = buffers.host();
	let bufnr = host.add_file_buffer("log.txt", &["on disk"]);
	buffers
		.replace(bufnr, &["edited elsewhere"], &ReplaceOptions::default())
		.await
		.unwrap();

	buffers.reload(bufnr).await.unwrap();
	assert_eq!(host.reloads(bufnr), 0);

	buffers.open("log.txt", &OpenOptions::default()).await.unwrap();
	deliver(&buffers, host.take_fired()).await;

	assert_eq!(host.reloads(bufnr), 1);
	assert_eq!(host.lines(bufnr), vec!["on disk"]);
}

#[tokio::test]
async fn sessions_on_one_host_stay_apart() {
	let _ = tracing_subscriber::fmt::try_init();
	let registry = Arc::new(SessionRegistry::new(Config::default()));
	let left = Buffers::with_registry(FakeHost::new(), SessionId::new("left"), registry.clone());
	let right = Buffers::with_registry(FakeHost::new(), SessionId::new("right"), registry.clone());

	let left_state = left.state().await.unwrap();
	let right_state = right.state().await.unwrap();

	assert_ne!(left_state.suffix(), right_state.suffix());
	let name = left_state.routines().name(bufsync::RoutineKind::Reload).to_string();
	let err = right.dispatch(&name, vec![json!(1)]).await.unwrap_err();
	assert!(matches!(err, Error::UnknownRoutine(_)));
}
