//! Integration tests for CLI execution using `assert_cmd`.
//!
//! These tests invoke the compiled binary on the fixtures in `tests/data` and
//! verify the files it writes and the errors it reports.

use anyhow::{Context, Result, ensure};
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn copy_fixture(name: &str, dir: &Path) -> Result<()> {
    let target = dir.join(name);
    fs::copy(format!("tests/data/{name}"), &target)
        .with_context(|| format!("copy fixture to {}", target.display()))?;
    Ok(())
}

fn bakery() -> Result<Command> {
    Command::cargo_bin("bakery").context("locate bakery binary")
}

#[test]
fn generates_default_toolsets() -> Result<()> {
    let temp = tempdir().context("create temp dir")?;
    copy_fixture("hello.yml", temp.path())?;
    bakery()?
        .current_dir(temp.path())
        .arg("hello.yml")
        .assert()
        .success();
    for file in ["GNUmakefile", "hello.sln", "exe1.vcxproj", "lib1.vcxproj.filters"] {
        ensure!(temp.path().join(file).exists(), "{file} should be generated");
    }
    Ok(())
}

#[test]
fn toolset_option_limits_the_output() -> Result<()> {
    let temp = tempdir().context("create temp dir")?;
    copy_fixture("hello.yml", temp.path())?;
    bakery()?
        .current_dir(temp.path())
        .args(["-t", "gnu", "hello.yml"])
        .assert()
        .success();
    ensure!(temp.path().join("GNUmakefile").exists());
    ensure!(
        !temp.path().join("hello.sln").exists(),
        "vs2010 files should not be generated"
    );
    Ok(())
}

#[test]
fn visual_studio_2012_is_generated_on_request() -> Result<()> {
    let temp = tempdir().context("create temp dir")?;
    copy_fixture("hello.yml", temp.path())?;
    bakery()?
        .current_dir(temp.path())
        .args(["-t", "vs2012", "hello.yml"])
        .assert()
        .success();
    let solution = fs::read_to_string(temp.path().join("hello.sln")).context("read solution")?;
    ensure!(solution.contains("Format Version 12.00"), "solution should be 2012: {solution}");
    let project = fs::read_to_string(temp.path().join("exe1.vcxproj")).context("read project")?;
    ensure!(project.contains("<PlatformToolset>v110</PlatformToolset>"));
    ensure!(!temp.path().join("GNUmakefile").exists());
    Ok(())
}

#[test]
fn directory_option_changes_directory_first() -> Result<()> {
    let temp = tempdir().context("create temp dir")?;
    let workdir = temp.path().join("work");
    fs::create_dir_all(&workdir).context("create work directory")?;
    copy_fixture("hello.yml", &workdir)?;
    bakery()?
        .current_dir(temp.path())
        .args(["-C", "work", "--toolset", "gnu", "hello.yml"])
        .assert()
        .success();
    ensure!(workdir.join("GNUmakefile").exists());
    ensure!(!temp.path().join("GNUmakefile").exists());
    Ok(())
}

#[test]
fn unknown_dependencies_are_reported() -> Result<()> {
    let temp = tempdir().context("create temp dir")?;
    copy_fixture("broken_dep.yml", temp.path())?;
    bakery()?
        .current_dir(temp.path())
        .args(["-t", "gnu", "broken_dep.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "target `app` depends on unknown target `missing`",
        ))
        .stderr(predicate::str::contains("1 error(s) reported"));
    ensure!(!temp.path().join("GNUmakefile").exists());
    Ok(())
}

#[test]
fn modules_without_errors_are_still_generated() -> Result<()> {
    let temp = tempdir().context("create temp dir")?;
    let good = temp.path().join("a");
    let bad = temp.path().join("b");
    fs::create_dir_all(&good).context("create module directory a")?;
    fs::create_dir_all(&bad).context("create module directory b")?;
    copy_fixture("hello.yml", &good)?;
    copy_fixture("unknown_property.yml", &bad)?;
    bakery()?
        .current_dir(temp.path())
        .args(["-t", "gnu", "a/hello.yml", "b/unknown_property.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown property `nosuch`"));
    ensure!(
        good.join("GNUmakefile").exists(),
        "the module that loaded cleanly should be generated"
    );
    ensure!(!bad.join("GNUmakefile").exists());
    Ok(())
}

#[test]
fn missing_inputs_fail_cleanly() -> Result<()> {
    let temp = tempdir().context("create temp dir")?;
    bakery()?
        .current_dir(temp.path())
        .arg("absent.yml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read `absent.yml`"));
    Ok(())
}

#[test]
fn unknown_toolsets_are_rejected() -> Result<()> {
    bakery()?
        .args(["-t", "xcode", "hello.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown toolset `xcode`"));
    Ok(())
}

#[test]
fn dump_model_logs_the_project() -> Result<()> {
    let temp = tempdir().context("create temp dir")?;
    copy_fixture("hello.yml", temp.path())?;
    bakery()?
        .current_dir(temp.path())
        .args(["--dump-model", "-t", "gnu", "hello.yml"])
        .assert()
        .success()
        .stderr(predicate::str::contains("project model"))
        .stderr(predicate::str::contains("\"exe1\""));
    Ok(())
}
