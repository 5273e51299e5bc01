#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

pub fn write_pipeline(dir: &Path, filename: &str, content: &str) {
    fs::write(dir.join(filename), content).expect("Failed to write pipeline file");
}

pub fn has_executable(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Pipeline of `sh -c` steps; each entry is (name, script)
pub fn sh_pipeline(steps: &[(&str, &str)]) -> String {
    let mut yaml = String::from("name: sh-pipeline\nsteps:\n");
    for (name, script) in steps {
        yaml.push_str(&format!(
            "  - name: {name}\n    exe: sh\n    args: [-c, {script:?}]\n    message: \"{name}: SUCCESS\"\n"
        ));
    }
    yaml
}

/// Minimal Go module that builds, tests and is gofmt-clean
pub fn write_go_project(dir: &Path) {
    fs::write(dir.join("go.mod"), "module example.com/add\n\ngo 1.18\n").unwrap();
    fs::write(
        dir.join("add.go"),
        "package add\n\nfunc add(a, b int) int {\n\treturn a + b\n}\n",
    )
    .unwrap();
    fs::write(
        dir.join("add_test.go"),
        "package add\n\nimport \"testing\"\n\nfunc TestAdd(t *testing.T) {\n\tif add(2, 3) != 5 {\n\t\tt.Error(\"bad sum\")\n\t}\n}\n",
    )
    .unwrap();
}

/// Go module with a compile error
pub fn write_go_project_with_build_error(dir: &Path) {
    write_go_project(dir);
    fs::write(
        dir.join("add.go"),
        "package add\n\nfunc add(a, b int) int {\n\treturn a + b + undefined\n}\n",
    )
    .unwrap();
}

/// Go module that compiles and passes tests but is not gofmt-clean
pub fn write_go_project_with_format_error(dir: &Path) {
    write_go_project(dir);
    fs::write(
        dir.join("add.go"),
        "package add\n\nfunc add(a, b int) int {\n    return a+b\n}\n",
    )
    .unwrap();
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_COMMITTER_NAME", "test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .env("GIT_AUTHOR_NAME", "test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .status()
        .expect("Failed to run git");
    assert!(status.success(), "git {:?} failed", args);
}

/// Turn `project` into a git repo on branch `main` whose `origin` is a bare
/// repository inside `remote`.
pub fn setup_git(project: &Path, remote: &Path) {
    git(remote, &["init", "--bare", "-q"]);
    git(project, &["init", "-q"]);
    git(project, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    let uri = format!("file://{}", remote.display());
    git(project, &["remote", "add", "origin", &uri]);
    git(project, &["add", "."]);
    git(project, &["commit", "-q", "-m", "test"]);
}
