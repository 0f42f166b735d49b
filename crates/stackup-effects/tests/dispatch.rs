use std::cell::RefCell;
use std::fs;
use std::io::{self, Write};
use std::rc::Rc;

use anyhow::Result;
use stackup_effects::{
    CommandSpec, Dispatcher, EffectError, ExecutionMode, Outcome, PlannedEffect,
};
use stackup_test_support::fixtures::{ServerTree, write_release_archive};
use stackup_test_support::mocks::RecordingRunner;

#[derive(Clone, Default)]
struct Captured(Rc<RefCell<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn dry_run_never_reaches_the_runner() -> Result<()> {
    let runner = RecordingRunner::new();
    let captured = Captured::default();
    let mut dispatcher = Dispatcher::new(ExecutionMode::DryRun)
        .with_runner(runner.clone())
        .with_echo(captured.clone());

    let tree = ServerTree::new()?;
    assert!(
        dispatcher
            .run_command(&CommandSpec::new("a2enmod").arg("rewrite"))?
            .is_suppressed()
    );
    assert!(
        dispatcher
            .download("http://omeka.org/files/omeka-2.4.1.zip", &tree.tmp_dir())?
            .is_suppressed()
    );
    let spawned = dispatcher.spawn_interactive(&CommandSpec::new("openssl").arg("req"))?;
    assert!(spawned.is_suppressed());

    assert!(runner.commands().is_empty());
    let echoed = String::from_utf8(captured.0.borrow().clone())?;
    let lines: Vec<_> = echoed.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "run([\"a2enmod\", \"rewrite\"])");
    assert!(lines[1].starts_with("download(\"http://omeka.org/files/omeka-2.4.1.zip\",directory="));
    assert_eq!(lines[2], "spawn([\"openssl\", \"req\"])");
    Ok(())
}

#[test]
fn live_non_zero_exit_is_a_command_failure() -> Result<()> {
    let runner = RecordingRunner::new().with_status("mysql", 1);
    let mut dispatcher = Dispatcher::new(ExecutionMode::Live)
        .with_runner(runner.clone())
        .without_echo();

    let Err(err) = dispatcher.run_command(&CommandSpec::new("mysql").args(["-e", "create database omeka"]))
    else {
        panic!("expected mysql failure to propagate");
    };
    assert!(matches!(
        err,
        EffectError::CommandFailed { ref program, status: Some(1), .. } if program == "mysql"
    ));
    assert_eq!(runner.command_lines(), ["mysql -e create database omeka"]);
    Ok(())
}

#[test]
fn spawned_process_receives_answers_in_live_mode() -> Result<()> {
    let runner = RecordingRunner::new();
    let mut dispatcher = Dispatcher::new(ExecutionMode::Live)
        .with_runner(runner.clone())
        .without_echo();

    let command = CommandSpec::new("openssl").arg("req");
    let Outcome::Performed(process) = dispatcher.spawn_interactive(&command)? else {
        panic!("expected a live spawn");
    };
    let output = dispatcher.feed_answers("openssl", process, "CA\nNova Scotia\n")?;
    assert!(matches!(output, Outcome::Performed(ref out) if out.success()));
    assert_eq!(
        runner.answers(),
        [("openssl".to_string(), "CA\nNova Scotia\n".to_string())]
    );
    Ok(())
}

#[test]
fn live_download_extract_and_move_release() -> Result<()> {
    let tree = ServerTree::new()?;
    let archive = tree.tmp_dir().join("omeka-2.4.1.zip");
    let hook_target = archive.clone();
    let runner = RecordingRunner::new().with_hook("wget", move |_| {
        write_release_archive(&hook_target, "omeka-2.4.1").expect("release archive");
    });
    let mut dispatcher = Dispatcher::new(ExecutionMode::Live)
        .with_runner(runner)
        .without_echo();

    dispatcher.download("http://omeka.org/files/omeka-2.4.1.zip", &tree.tmp_dir())?;
    assert_eq!(
        dispatcher.extract_zip(&archive, &tree.tmp_dir())?,
        Outcome::Performed(3)
    );
    let release = tree.tmp_dir().join("omeka-2.4.1");
    assert_eq!(dispatcher.purge_dir(&tree.document_root())?, Outcome::Performed(1));
    assert_eq!(
        dispatcher.move_contents(&release, &tree.document_root())?,
        Outcome::Performed(4)
    );
    assert!(tree.document_root().join(".htaccess").is_file());
    assert!(!tree.document_root().join("index.html").exists());

    assert_eq!(
        dispatcher.remove_empty_dirs(&release, &tree.tmp_dir())?,
        Outcome::Performed(1)
    );
    dispatcher.remove_file(&archive)?;
    assert_eq!(fs::read_dir(tree.tmp_dir())?.count(), 0);
    assert!(dispatcher.journal().is_empty());
    Ok(())
}

#[test]
fn journal_serialises_as_json_array() -> Result<()> {
    let mut dispatcher = Dispatcher::new(ExecutionMode::DryRun).without_echo();
    dispatcher.describe(PlannedEffect::new("communicate").named("input", "CA\n"))?;
    let json = serde_json::to_string(dispatcher.journal())?;
    assert_eq!(
        json,
        r#"[{"kind":"communicate","args":[{"name":"input","value":"CA\n"}]}]"#
    );
    Ok(())
}
