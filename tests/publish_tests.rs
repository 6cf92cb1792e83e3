//! Git publishing against a local bare remote.
//!
//! Each test seeds a bare repository with the EKS module, clones it and runs
//! the pipeline from the clone, the way a CI checkout would.

use std::path::Path;

use git2::build::TreeUpdateBuilder;
use git2::{FileMode, Oid, Repository, RepositoryInitOptions, Signature};
use version_gate::{
    ChangePublisher, CommitMessage, ErrorKind, GitPublisher, Pipeline, RunResult, StaticSource,
    WriterOptions,
};

const ARTIFACT: &str = "modules/eks/variables.tf";

const VARIABLES: &str = r#"variable "cluster_version" {
  type = string

  validation {
    condition     = contains(["1.31", "1.32", "1.33"], var.cluster_version)
    error_message = "The cluster_version must be one of: 1.31, 1.32, 1.33."
  }
}
"#;

const SUPPORTED: [&str; 3] = ["1.32", "1.33", "1.34"];

fn seed_remote(path: &Path) -> Repository {
    let mut options = RepositoryInitOptions::new();
    options.bare(true).initial_head("main");
    let repo = Repository::init_opts(path, &options).unwrap();

    let commit = {
        let blob = repo.blob(VARIABLES.as_bytes()).unwrap();
        let main_tf = repo.blob(b"resource \"aws_eks_cluster\" \"this\" {}\n").unwrap();
        let empty = repo.treebuilder(None).unwrap().write().unwrap();
        let empty = repo.find_tree(empty).unwrap();
        let tree_id = TreeUpdateBuilder::new()
            .upsert(ARTIFACT, blob, FileMode::Blob)
            .upsert("modules/eks/main.tf", main_tf, FileMode::Blob)
            .create_updated(&repo, &empty)
            .unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let signature = Signature::now("Platform Team", "platform@example.com").unwrap();
        repo.commit(
            Some("refs/heads/main"),
            &signature,
            &signature,
            "Add EKS module",
            &tree,
            &[],
        )
        .unwrap()
    };
    assert!(!commit.is_zero());
    repo
}

fn clone(remote: &Path, into: &Path) -> Repository {
    Repository::clone(remote.to_str().unwrap(), into).unwrap()
}

fn pipeline(checkout: &Path) -> Pipeline<StaticSource, GitPublisher> {
    Pipeline::new(
        StaticSource::new(SUPPORTED),
        GitPublisher::new(checkout, ARTIFACT),
        WriterOptions::default(),
    )
}

fn main_tip(repo: &Repository) -> Oid {
    repo.refname_to_id("refs/heads/main").unwrap()
}

fn artifact_at(repo: &Repository, commit: Oid) -> String {
    let tree = repo.find_commit(commit).unwrap().tree().unwrap();
    let entry = tree.get_path(Path::new(ARTIFACT)).unwrap();
    let blob = repo.find_blob(entry.id()).unwrap();
    String::from_utf8(blob.content().to_vec()).unwrap()
}

// =============================================================================
// Successful publishing
// =============================================================================

mod publish_success_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_update_is_pushed_to_remote() {
        let dir = tempfile::tempdir().unwrap();
        let remote_path = dir.path().join("remote.git");
        let remote = seed_remote(&remote_path);
        let base = main_tip(&remote);
        let checkout = dir.path().join("checkout");
        clone(&remote_path, &checkout);

        let id = match pipeline(&checkout).run_once() {
            RunResult::Updated(id) => id,
            other => panic!("expected update, got {:?}", other),
        };

        let tip = main_tip(&remote);
        assert_eq!(tip.to_string(), id);

        let commit = remote.find_commit(tip).unwrap();
        assert_eq!(commit.parent_id(0).unwrap(), base);
        assert_eq!(
            commit.message().unwrap(),
            "chore(eks): sync cluster_version with standard support\n\n\
             Added: 1.34\nRemoved: 1.31\nSupported: 1.32, 1.33, 1.34\n"
        );

        let published = artifact_at(&remote, tip);
        assert!(published.contains(r#"contains(["1.32", "1.33", "1.34"], var.cluster_version)"#));
        assert!(published.contains("must be one of: 1.32, 1.33, 1.34."));
    }

    #[test]
    fn test_clone_is_fast_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let remote_path = dir.path().join("remote.git");
        let remote = seed_remote(&remote_path);
        let checkout = dir.path().join("checkout");
        let local = clone(&remote_path, &checkout);

        pipeline(&checkout).run_once();

        assert_eq!(main_tip(&local), main_tip(&remote));
        let on_disk = std::fs::read_to_string(checkout.join(ARTIFACT)).unwrap();
        assert_eq!(on_disk, artifact_at(&remote, main_tip(&remote)));
    }

    #[test]
    fn test_uncommitted_edit_survives_publish() {
        let dir = tempfile::tempdir().unwrap();
        let remote_path = dir.path().join("remote.git");
        let remote = seed_remote(&remote_path);
        let checkout = dir.path().join("checkout");
        let local = clone(&remote_path, &checkout);

        let edited = VARIABLES.replace("type = string", "type = string # local note");
        std::fs::write(checkout.join(ARTIFACT), &edited).unwrap();

        assert!(matches!(pipeline(&checkout).run_once(), RunResult::Updated(_)));

        assert_eq!(main_tip(&local), main_tip(&remote));
        assert_eq!(std::fs::read_to_string(checkout.join(ARTIFACT)).unwrap(), edited);
    }

    #[test]
    fn test_second_run_makes_no_commit() {
        let dir = tempfile::tempdir().unwrap();
        let remote_path = dir.path().join("remote.git");
        let remote = seed_remote(&remote_path);
        let checkout = dir.path().join("checkout");
        clone(&remote_path, &checkout);

        assert!(matches!(pipeline(&checkout).run_once(), RunResult::Updated(_)));
        let tip = main_tip(&remote);

        let second = pipeline(&checkout).run_once();
        assert!(matches!(second, RunResult::NoChangeNeeded), "got {:?}", second);
        assert_eq!(main_tip(&remote), tip);
    }

    #[test]
    fn test_no_push_commits_locally() {
        let dir = tempfile::tempdir().unwrap();
        let remote_path = dir.path().join("remote.git");
        let remote = seed_remote(&remote_path);
        let base = main_tip(&remote);
        let checkout = dir.path().join("checkout");
        let local = clone(&remote_path, &checkout);

        let pipeline = Pipeline::new(
            StaticSource::new(SUPPORTED),
            GitPublisher::new(&checkout, ARTIFACT).with_push(false),
            WriterOptions::default(),
        );
        assert!(matches!(pipeline.run_once(), RunResult::Updated(_)));

        assert_eq!(main_tip(&remote), base);
        assert_ne!(main_tip(&local), base);
        assert_eq!(
            local.find_commit(main_tip(&local)).unwrap().parent_id(0).unwrap(),
            base
        );
    }
}

// =============================================================================
// Concurrent publishers
// =============================================================================

mod publish_conflict_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_remote_moved_since_read_is_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let remote_path = dir.path().join("remote.git");
        let remote = seed_remote(&remote_path);
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        clone(&remote_path, &first);
        clone(&remote_path, &second);

        let slow = pipeline(&first);
        let plan = slow.plan().unwrap();
        assert!(plan.changes_artifact());

        let winner = match pipeline(&second).run_once() {
            RunResult::Updated(id) => id,
            other => panic!("expected update, got {:?}", other),
        };

        let message = CommitMessage::for_update("cluster_version", &plan.drift, &plan.latest);
        let err = slow
            .publisher()
            .publish(&plan.snapshot, &plan.updated, &message)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PublishConflict);
        assert_eq!(main_tip(&remote).to_string(), winner);

        // The next run starts over from the new remote tip.
        let retry = slow.run_once();
        assert!(matches!(retry, RunResult::NoChangeNeeded), "got {:?}", retry);
        assert_eq!(main_tip(&remote).to_string(), winner);
    }

    #[test]
    fn test_read_uses_remote_tip() {
        let dir = tempfile::tempdir().unwrap();
        let remote_path = dir.path().join("remote.git");
        seed_remote(&remote_path);
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        clone(&remote_path, &first);
        clone(&remote_path, &second);

        let winner = match pipeline(&second).run_once() {
            RunResult::Updated(id) => id,
            other => panic!("expected update, got {:?}", other),
        };

        let snapshot = GitPublisher::new(&first, ARTIFACT).read_artifact().unwrap();
        assert_eq!(snapshot.revision, winner);
        assert!(snapshot.content.contains("\"1.34\""));
    }
}

// =============================================================================
// Unreachable remote
// =============================================================================

mod publish_unavailable_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_remote_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let remote_path = dir.path().join("remote.git");
        seed_remote(&remote_path);
        let checkout = dir.path().join("checkout");
        clone(&remote_path, &checkout);
        std::fs::remove_dir_all(&remote_path).unwrap();

        match pipeline(&checkout).run_once() {
            RunResult::Failed(e) => assert_eq!(e.kind(), ErrorKind::PublishUnavailable),
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
