use assert_cmd::prelude::*;
use predicates::str::contains;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn shader_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("shaders")
}

#[test]
fn summary_only_renders_demo_scene_headless() {
    let dir = tempdir().expect("temp dir");
    let mut cmd = Command::cargo_bin("orbit-mesh").expect("binary exists");
    cmd.arg("--summary-only")
        .arg("--shaders")
        .arg(shader_dir())
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("--frames")
        .arg("2");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 2 meshes"))
        .stdout(contains(
            " - mesh 0: equation_surface (triangles) vertices=2500 indices=14406",
        ))
        .stdout(contains(
            " - mesh 1: equation_curve (triangle_strip) vertices=400 indices=400",
        ))
        .stdout(contains("Camera at (3.00, 3.00, 3.00)"))
        .stdout(contains("Frame 2: 2 draw call(s)"))
        .stdout(contains("triangle_strip x400"));
}

#[test]
fn missing_shaders_fail_construction() {
    let dir = tempdir().expect("temp dir");
    let mut cmd = Command::cargo_bin("orbit-mesh").expect("binary exists");
    cmd.arg("--summary-only")
        .arg("--shaders")
        .arg(dir.path().join("nowhere"))
        .arg("--config")
        .arg(dir.path().join("absent.toml"));
    cmd.assert()
        .failure()
        .stderr(contains("missing vertex shader source"));
}

#[test]
fn malformed_config_is_reported() {
    let dir = tempdir().expect("temp dir");
    let config = dir.path().join("config.toml");
    fs::write(&config, "[main_window\n").expect("write config");
    let mut cmd = Command::cargo_bin("orbit-mesh").expect("binary exists");
    cmd.arg("--summary-only")
        .arg("--shaders")
        .arg(shader_dir())
        .arg("--config")
        .arg(&config);
    cmd.assert().failure().stderr(contains("invalid settings"));
}

#[test]
fn unknown_arguments_are_rejected() {
    let mut cmd = Command::cargo_bin("orbit-mesh").expect("binary exists");
    cmd.arg("--wireframe");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --wireframe"));
}
