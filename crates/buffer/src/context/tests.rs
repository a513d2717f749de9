use bufsync_rpc::fake::FakeHost;
use bufsync_rpc::{HostError, Options, Rpc};
use pretty_assertions::assert_eq;

use super::*;

async fn current(host: &FakeHost) -> Result<Bufnr> {
	let value = host.call("bufnr", vec![json!("%")]).await?;
	int("bufnr", &value).map(Bufnr)
}

fn failing() -> Error {
	Error::Host(HostError::Protocol("action failed".into()))
}

#[tokio::test]
async fn ensure_on_current_buffer_changes_nothing() {
	let host = FakeHost::new();
	let bufnr = host.current_buffer();
	let winid = host.current_window();

	let seen = ensure(&host, bufnr, async || current(&host).await).await.unwrap();

	assert_eq!(seen, bufnr);
	assert_eq!(host.current_window(), winid);
	assert_eq!(host.current_buffer(), bufnr);
	assert_eq!(host.count("win_gotoid"), 0);
}

#[tokio::test]
async fn ensure_focuses_a_visible_buffer_and_returns() {
	let host = FakeHost::new();
	let original = host.current_window();
	let other = host.add_buffer("other", &[]);
	host.split(other);

	let seen = ensure(&host, other, async || current(&host).await).await.unwrap();

	assert_eq!(seen, other);
	assert_eq!(host.current_window(), original);
	assert_eq!(host.count("win_gotoid"), 2);
}

#[tokio::test]
async fn ensure_displays_a_hidden_buffer_and_switches_back() {
	let host = FakeHost::new();
	let original = host.current_buffer();
	let winid = host.current_window();
	let hidden = host.add_buffer("hidden", &[]);

	let seen = ensure(&host, hidden, async || current(&host).await).await.unwrap();

	assert_eq!(seen, hidden);
	assert_eq!(host.current_buffer(), original);
	assert_eq!(host.current_window(), winid);
	assert_eq!(host.count(&format!("command:noautocmd keepjumps keepalt {hidden}buffer")), 1);
	assert_eq!(host.count(&format!("command:noautocmd keepjumps keepalt {original}buffer")), 1);
}

#[tokio::test]
async fn ensure_switches_back_when_the_action_fails() {
	let host = FakeHost::new();
	let original = host.current_buffer();
	let hidden = host.add_buffer("hidden", &[]);

	let err = ensure(&host, hidden, async || -> Result<()> { Err(failing()) })
		.await
		.unwrap_err();

	assert!(matches!(err, Error::Host(HostError::Protocol(_))));
	assert_eq!(host.current_buffer(), original);
}

#[tokio::test]
async fn ensure_surfaces_a_failed_switch_back() {
	let host = FakeHost::new();
	let other = host.add_buffer("other", &[]);
	host.split(other);
	host.fail_after("win_gotoid", 1, "E994: Not allowed in a popup window");

	let err = ensure(&host, other, async || current(&host).await).await.unwrap_err();

	let Error::Restore { source, primary } = err else {
		panic!("expected a restoration error, got {err:?}");
	};
	assert!(matches!(*source, Error::Host(HostError::Call { .. })));
	assert!(primary.is_none());
}

#[tokio::test]
async fn with_modifiable_relaxes_and_restores_both_flags() {
	let host = FakeHost::new();
	let bufnr = host.add_buffer("locked", &["a"]);
	host.set_option(bufnr, "modifiable", json!(0));

	with_modifiable(&host, bufnr, async || -> Result<()> {
		host.call("setbufline", vec![json!(bufnr), json!(1), json!(["b"])]).await?;
		Ok(())
	})
	.await
	.unwrap();

	assert_eq!(host.lines(bufnr), vec!["b"]);
	assert_eq!(host.option(bufnr, "modifiable"), json!(0));
	assert_eq!(host.option(bufnr, "modified"), json!(0));
}

#[tokio::test]
async fn nested_with_modifiable_restores_outer_captured_values() {
	let host = FakeHost::new();
	let bufnr = host.add_buffer("locked", &["a"]);
	host.set_option(bufnr, "modifiable", json!(0));
	host.set_option(bufnr, "modified", json!(0));

	with_modifiable(&host, bufnr, async || -> Result<()> {
		host.set_buf_option(bufnr, "modified", json!(1)).await?;
		with_modifiable(&host, bufnr, async || -> Result<()> {
			host.call("appendbufline", vec![json!(bufnr), json!(1), json!(["inner"])]).await?;
			host.set_buf_option(bufnr, "modifiable", json!(0)).await?;
			Ok(())
		})
		.await?;
		// The inner call put back what it saw on entry.
		assert_eq!(host.option(bufnr, "modifiable"), json!(1));
		assert_eq!(host.option(bufnr, "modified"), json!(1));
		Ok(())
	})
	.await
	.unwrap();

	assert_eq!(host.lines(bufnr), vec!["a", "inner"]);
	assert_eq!(host.option(bufnr, "modifiable"), json!(0));
	assert_eq!(host.option(bufnr, "modified"), json!(0));
}

#[tokio::test]
async fn with_modifiable_restores_flags_when_the_action_fails() {
	let host = FakeHost::new();
	let bufnr = host.add_buffer("locked", &["a"]);
	host.set_option(bufnr, "modifiable", json!(0));

	let err = with_modifiable(&host, bufnr, async || -> Result<()> { Err(failing()) })
		.await
		.unwrap_err();

	assert!(matches!(err, Error::Host(HostError::Protocol(_))));
	assert_eq!(host.option(bufnr, "modifiable"), json!(0));
}

#[tokio::test]
async fn restoration_failure_carries_the_primary_error() {
	let host = FakeHost::new();
	let bufnr = host.add_buffer("locked", &["a"]);
	// Entry sets modifiable once; the next write is the restore.
	host.fail_after("setbufvar:modifiable", 1, "E21: Cannot make changes");

	let err = with_modifiable(&host, bufnr, async || -> Result<()> { Err(failing()) })
		.await
		.unwrap_err();

	let Error::Restore { source, primary } = err else {
		panic!("expected a restoration error, got {err:?}");
	};
	assert!(matches!(*source, Error::Host(HostError::Call { .. })));
	assert!(matches!(primary.as_deref(), Some(Error::Host(HostError::Protocol(_)))));
	// The other flag was still written back.
	assert_eq!(host.count("setbufvar:modified"), 1);
}

#[test]
fn finish_keeps_the_outcome_when_restoration_succeeds() {
	assert_eq!(finish(Ok(3), Ok(())).unwrap(), 3);
	assert!(matches!(finish::<()>(Err(failing()), Ok(())), Err(Error::Host(_))));
}

#[tokio::test]
async fn manual_folds_are_reverted_after_a_failed_edit() {
	let host = FakeHost::new();
	let bufnr = host.add_buffer("folded", &["a"]);
	host.set_option(bufnr, "foldmethod", json!("syntax"));

	let err = with_manual_folds(&host, bufnr, async || -> Result<()> {
		assert_eq!(host.option(bufnr, "foldmethod"), json!("manual"));
		Err(failing())
	})
	.await
	.unwrap_err();

	assert!(matches!(err, Error::Host(HostError::Protocol(_))));
	assert_eq!(host.option(bufnr, "foldmethod"), json!("syntax"));
	assert_eq!(host.current_buffer(), Bufnr(1));
}
