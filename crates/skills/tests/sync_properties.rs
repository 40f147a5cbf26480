#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use {
    jfp_registry::{Prompt, Registry},
    jfp_skills::{
        Outcome, Selection, SkillSyncer, SyncOptions,
        hash::content_hash,
        manifest::{self, Manifest, read_manifest, write_manifest},
        render::render_prompt,
    },
};

fn catalog(content: &str) -> Registry {
    Registry::new(vec![
        Prompt::new("code-review", "Code Review", content),
        Prompt::new("write-tests", "Write Tests", "Write tests for {{FILE}}."),
    ])
}

fn skill(root: &Path, id: &str) -> std::path::PathBuf {
    root.join(id).join("SKILL.md")
}

fn mtime(path: &Path) -> std::time::SystemTime {
    std::fs::metadata(path).unwrap().modified().unwrap()
}

#[test]
fn second_update_is_a_no_op() {
    let tmp = tempfile::tempdir().unwrap();
    let syncer = SkillSyncer::new(tmp.path(), "0.1.0");
    syncer.install_selection(&catalog("v1"), &Selection::All, SyncOptions::default());

    let first = syncer.update(&catalog("v2"), SyncOptions::default());
    assert_eq!(first.counts.updated, 1);
    assert_eq!(first.counts.unchanged, 1);

    let manifest_before = std::fs::read(manifest::manifest_path(tmp.path())).unwrap();
    let stamps: Vec<_> = ["code-review", "write-tests"]
        .iter()
        .map(|id| mtime(&skill(tmp.path(), id)))
        .collect();

    let second = syncer.update(&catalog("v2"), SyncOptions::default());
    assert!(second.results.iter().all(|r| r.outcome == Outcome::Unchanged));
    assert!(second.exit_ok());
    assert_eq!(
        std::fs::read(manifest::manifest_path(tmp.path())).unwrap(),
        manifest_before
    );
    for (id, stamp) in ["code-review", "write-tests"].iter().zip(stamps) {
        assert_eq!(mtime(&skill(tmp.path(), id)), stamp);
    }
}

#[test]
fn user_edits_survive_update_until_forced() {
    let tmp = tempfile::tempdir().unwrap();
    let syncer = SkillSyncer::new(tmp.path(), "0.1.0");
    syncer.install_selection(
        &catalog("v1"),
        &Selection::Ids(vec!["code-review".into()]),
        SyncOptions::default(),
    );

    let path = skill(tmp.path(), "code-review");
    let mut edited = std::fs::read_to_string(&path).unwrap();
    edited.push_str("\nMy extra checklist item.\n");
    std::fs::write(&path, &edited).unwrap();

    let blocked = syncer.update(&catalog("v2"), SyncOptions::default());
    let r = &blocked.results[0];
    assert_eq!(r.outcome, Outcome::Skipped);
    assert_eq!(r.reason.as_deref(), Some("user modifications detected"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), edited);
    assert!(!blocked.exit_ok());

    let forced = syncer.update(&catalog("v2"), SyncOptions {
        force: true,
        ..Default::default()
    });
    assert_eq!(forced.results[0].outcome, Outcome::Updated);
    let fresh = render_prompt(catalog("v2").get_prompt("code-review").unwrap());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), fresh);
    assert_eq!(
        read_manifest(tmp.path())
            .unwrap()
            .get("code-review")
            .unwrap()
            .hash,
        content_hash(&fresh)
    );
}

#[test]
fn update_recovers_after_failed_manifest_write() {
    let tmp = tempfile::tempdir().unwrap();
    let syncer = SkillSyncer::new(tmp.path(), "0.1.0");
    let only_review = Selection::Ids(vec!["code-review".into()]);
    syncer.install_selection(&catalog("v1"), &only_review, SyncOptions::default());

    // A directory squatting on the temp path makes the manifest rename fail.
    let blocker = tmp.path().join("manifest.json.tmp");
    std::fs::create_dir_all(blocker.join("occupied")).unwrap();
    let failed = syncer.update(&catalog("v2"), SyncOptions::default());
    assert_eq!(failed.results[0].outcome, Outcome::Updated);
    assert!(failed.manifest_warning.is_some());
    assert!(!failed.exit_ok());
    std::fs::remove_dir_all(&blocker).unwrap();

    let fresh = render_prompt(catalog("v2").get_prompt("code-review").unwrap());
    let path = skill(tmp.path(), "code-review");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), fresh);
    assert_ne!(
        read_manifest(tmp.path())
            .unwrap()
            .get("code-review")
            .unwrap()
            .hash,
        content_hash(&fresh)
    );

    let healed = syncer.update(&catalog("v2"), SyncOptions::default());
    let r = &healed.results[0];
    assert_eq!(r.outcome, Outcome::Updated);
    assert_eq!(r.reason.as_deref(), Some("existing file matches, now tracked"));
    assert!(healed.exit_ok());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), fresh);
    assert_eq!(
        read_manifest(tmp.path())
            .unwrap()
            .get("code-review")
            .unwrap()
            .hash,
        content_hash(&fresh)
    );

    let settled = syncer.update(&catalog("v2"), SyncOptions::default());
    assert_eq!(settled.results[0].outcome, Outcome::Unchanged);
}

#[test]
fn corrupt_manifest_means_nothing_installed() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(manifest::manifest_path(tmp.path()), "{\"entries\": [oops").unwrap();
    assert!(read_manifest(tmp.path()).is_none());

    let syncer = SkillSyncer::new(tmp.path(), "0.1.0");
    let report = syncer.update(&catalog("v1"), SyncOptions::default());
    assert!(report.results.is_empty());
    assert!(report.exit_ok());
}

#[test]
fn manifest_round_trips_through_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let syncer = SkillSyncer::new(tmp.path().join("nested/root"), "0.1.0");
    syncer.install_selection(&catalog("v1"), &Selection::All, SyncOptions::default());

    let loaded: Manifest = read_manifest(syncer.root()).unwrap();
    let other = tmp.path().join("copy");
    write_manifest(&other, &loaded).unwrap();
    assert_eq!(read_manifest(&other).unwrap(), loaded);
}

#[test]
fn personal_and_project_roots_are_independent() {
    let tmp = tempfile::tempdir().unwrap();
    let personal = SkillSyncer::new(tmp.path().join("personal"), "0.1.0");
    let project = SkillSyncer::new(tmp.path().join("project"), "0.1.0");

    personal.install_selection(&catalog("v1"), &Selection::All, SyncOptions::default());
    project.install_selection(
        &catalog("v1"),
        &Selection::Ids(vec!["write-tests".into()]),
        SyncOptions::default(),
    );

    assert_eq!(personal.manifest().entries.len(), 2);
    assert_eq!(project.manifest().entries.len(), 1);

    project.uninstall(&["write-tests".into()], SyncOptions::default());
    assert!(project.manifest().entries.is_empty());
    assert!(skill(personal.root(), "write-tests").exists());
}
