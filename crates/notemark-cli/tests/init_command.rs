use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

#[test]
fn init_creates_vault_config() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let target = temp.path().join("vault");

    let mut cmd = cli();
    cmd.args(["init", target.to_str().unwrap()]);

    cmd.assert()
        .success()
        .stdout(contains("Initialized vault at"));

    assert!(target.join(".notemark/config.yaml").is_file());
    Ok(())
}

#[test]
fn init_twice_keeps_existing_config() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let config = temp.path().join(".notemark/config.yaml");

    cli().args(["init", temp.path().to_str().unwrap()]).assert().success();
    std::fs::write(&config, "archive_path: Done.md\n")?;

    cli()
        .args(["init", temp.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("already initialized"));

    assert_eq!(std::fs::read_to_string(&config)?, "archive_path: Done.md\n");
    Ok(())
}

#[test]
fn commands_outside_a_vault_are_usage_errors() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;

    let mut cmd = cli();
    cmd.current_dir(temp.path()).arg("tasks");

    cmd.assert()
        .failure()
        .code(64)
        .stderr(contains("no .notemark directory"));
    Ok(())
}

#[test]
fn invalid_config_maps_to_config_exit_code() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    std::fs::create_dir_all(temp.path().join(".notemark"))?;
    std::fs::write(
        temp.path().join(".notemark/config.yaml"),
        "markers:\n  task: \"task\"\n",
    )?;

    let mut cmd = cli();
    cmd.args(["--vault", temp.path().to_str().unwrap(), "scan"]);

    cmd.assert().failure().code(78);
    Ok(())
}

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_notemark"))
}
