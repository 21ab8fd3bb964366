//! Behavioral tests for the platform contract, run against the mock.
//!
//! These cover the issue, comment, status, and discovery semantics every
//! provider shares, through the `Platform` trait object the bot holds.

use depbot::core::types::BranchName;
use depbot::git::{CommitFilesConfig, FileChange};
use depbot::platform::mock::{FailOn, MockOperation, MockPlatform, MockRepo};
use depbot::platform::{
    create_platform, AutodiscoverConfig, BranchStatus, BranchStatusConfig, Capability,
    CapabilitySet, CheckState, CreatePrConfig, EnsureCommentConfig, EnsureCommentRemoval,
    EnsureIssueConfig, EnsureIssueResult, IssueState, Platform, PlatformError, PlatformParams,
    Pr, RepoParams, RepoSortMethod, SortOrder, StatusCheck,
};

fn issue_config(title: &str, body: &str) -> EnsureIssueConfig {
    EnsureIssueConfig {
        title: title.into(),
        body: body.into(),
        ..Default::default()
    }
}

mod ensure_issue_tests {
    use super::*;

    #[tokio::test]
    async fn creates_when_absent() {
        let mock = MockPlatform::new();

        let result = mock
            .ensure_issue(&issue_config("Dependency Dashboard", "all good"))
            .await
            .unwrap();

        assert_eq!(result, Some(EnsureIssueResult::Created));
        assert_eq!(mock.issues().len(), 1);
    }

    #[tokio::test]
    async fn unchanged_issue_is_left_alone() {
        let mock = MockPlatform::new().with_issue("Dependency Dashboard", "all good", IssueState::Open);

        let result = mock
            .ensure_issue(&issue_config("Dependency Dashboard", "all good"))
            .await
            .unwrap();

        assert_eq!(result, None);
        assert!(mock.operations().is_empty());
    }

    #[tokio::test]
    async fn open_issue_is_updated() {
        let mock = MockPlatform::new().with_issue("Dependency Dashboard", "old", IssueState::Open);

        let result = mock
            .ensure_issue(&issue_config("Dependency Dashboard", "new"))
            .await
            .unwrap();

        assert_eq!(result, Some(EnsureIssueResult::Updated));
        assert_eq!(mock.issues()[0].body.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn closed_issue_with_once_is_not_recreated() {
        let mock = MockPlatform::new().with_issue("Action Required", "old", IssueState::Closed);
        let config = EnsureIssueConfig {
            once: true,
            ..issue_config("Action Required", "new")
        };

        assert_eq!(mock.ensure_issue(&config).await.unwrap(), None);
        assert_eq!(mock.issues().len(), 1);
    }

    #[tokio::test]
    async fn closed_issue_is_reopened_when_asked() {
        let mock = MockPlatform::new().with_issue("Action Required", "old", IssueState::Closed);
        let config = EnsureIssueConfig {
            should_reopen: true,
            ..issue_config("Action Required", "new")
        };

        let result = mock.ensure_issue(&config).await.unwrap();

        assert_eq!(result, Some(EnsureIssueResult::Updated));
        assert_eq!(mock.issues()[0].state, Some(IssueState::Open));
        assert!(mock.operations().contains(&MockOperation::UpdateIssue {
            number: 1,
            title: "Action Required".into(),
            reopened: true,
        }));
    }

    #[tokio::test]
    async fn closed_issue_without_reopen_gets_a_new_one() {
        let mock = MockPlatform::new().with_issue("Action Required", "old", IssueState::Closed);

        let result = mock
            .ensure_issue(&issue_config("Action Required", "new"))
            .await
            .unwrap();

        assert_eq!(result, Some(EnsureIssueResult::Created));
        assert_eq!(mock.issues().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_open_issues_are_closed() {
        let mock = MockPlatform::new()
            .with_issue("Dependency Dashboard", "first", IssueState::Open)
            .with_issue("Dependency Dashboard", "second", IssueState::Open);

        let result = mock
            .ensure_issue(&issue_config("Dependency Dashboard", "third"))
            .await
            .unwrap();

        assert_eq!(result, Some(EnsureIssueResult::Updated));
        let issues = mock.issues();
        assert_eq!(issues[0].state, Some(IssueState::Closed));
        assert_eq!(issues[1].state, Some(IssueState::Open));
        assert_eq!(issues[1].body.as_deref(), Some("third"));
    }

    #[tokio::test]
    async fn reuse_title_renames_existing_issue() {
        let mock = MockPlatform::new().with_issue("Old Dashboard", "body", IssueState::Open);
        let config = EnsureIssueConfig {
            reuse_title: Some("Old Dashboard".into()),
            ..issue_config("Dependency Dashboard", "body")
        };

        assert_eq!(
            mock.ensure_issue(&config).await.unwrap(),
            Some(EnsureIssueResult::Updated)
        );
        assert_eq!(mock.issues()[0].title.as_deref(), Some("Dependency Dashboard"));
    }

    #[tokio::test]
    async fn closing_leaves_other_titles_open() {
        let mock = MockPlatform::new()
            .with_issue("Dependency Dashboard", "a", IssueState::Open)
            .with_issue("Something else", "b", IssueState::Open);

        mock.ensure_issue_closing("Dependency Dashboard").await.unwrap();

        assert_eq!(mock.find_issue("Dependency Dashboard").await.unwrap(), None);
        assert!(mock.find_issue("Something else").await.unwrap().is_some());
    }
}

mod comment_tests {
    use super::*;

    async fn mock_with_pr() -> MockPlatform {
        let mock = MockPlatform::new();
        mock.create_pr(CreatePrConfig {
            source_branch: "depbot/serde".into(),
            target_branch: "main".into(),
            pr_title: "Update serde".into(),
            ..Default::default()
        })
        .await
        .unwrap();
        mock
    }

    #[tokio::test]
    async fn topic_comment_is_added_then_updated() {
        let mock = mock_with_pr().await;
        let config = |content: &str| EnsureCommentConfig {
            number: 1,
            topic: Some("Rebase Notice".into()),
            content: content.into(),
        };

        assert!(mock.ensure_comment(&config("first")).await.unwrap());
        assert!(!mock.ensure_comment(&config("first")).await.unwrap());
        assert!(mock.ensure_comment(&config("second")).await.unwrap());

        let comments = mock.comments(1);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].body, "### Rebase Notice\n\nsecond");
    }

    #[tokio::test]
    async fn removal_by_topic_and_content() {
        let mock = mock_with_pr().await;
        for (topic, content) in [(Some("Notice"), "a"), (None, "plain"), (None, "keep")] {
            mock.ensure_comment(&EnsureCommentConfig {
                number: 1,
                topic: topic.map(String::from),
                content: content.into(),
            })
            .await
            .unwrap();
        }

        mock.ensure_comment_removal(&EnsureCommentRemoval::ByTopic {
            number: 1,
            topic: "Notice".into(),
        })
        .await
        .unwrap();
        mock.ensure_comment_removal(&EnsureCommentRemoval::ByContent {
            number: 1,
            content: "plain".into(),
        })
        .await
        .unwrap();

        let bodies: Vec<String> = mock.comments(1).into_iter().map(|c| c.body).collect();
        assert_eq!(bodies, vec!["keep"]);
    }
}

mod status_tests {
    use super::*;

    #[tokio::test]
    async fn set_status_then_read_back() {
        let mock = MockPlatform::new().with_status(
            "depbot/serde",
            StatusCheck::new("ci/build", CheckState::Success),
        );

        mock.set_branch_status(&BranchStatusConfig {
            branch_name: "depbot/serde".into(),
            context: "depbot/stability-days".into(),
            description: "Waiting for stability days".into(),
            state: BranchStatus::Yellow,
            url: None,
        })
        .await
        .unwrap();

        assert_eq!(
            mock.get_branch_status_check("depbot/serde", "depbot/stability-days")
                .await
                .unwrap(),
            Some(BranchStatus::Yellow)
        );
        assert_eq!(
            mock.get_branch_status("depbot/serde", false).await.unwrap(),
            BranchStatus::Yellow
        );
        // The bot's own pending check does not block it
        assert_eq!(
            mock.get_branch_status("depbot/serde", true).await.unwrap(),
            BranchStatus::Green
        );
    }

    #[tokio::test]
    async fn branch_without_checks_is_pending() {
        let mock = MockPlatform::new();
        assert_eq!(
            mock.get_branch_status("depbot/none", true).await.unwrap(),
            BranchStatus::Yellow
        );
    }
}

mod setup_tests {
    use super::*;

    #[tokio::test]
    async fn factory_builds_a_working_mock() {
        let platform: Box<dyn Platform> = create_platform("Mock", None, None).unwrap();
        assert_eq!(platform.name(), "mock");

        let first = platform
            .init_platform(PlatformParams {
                username: Some("renovate-bot".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let second = platform.init_platform(PlatformParams::default()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unknown_platform_is_rejected() {
        let result = create_platform("bitbucket-server", None, None);
        assert!(matches!(result, Err(PlatformError::Conflict(msg)) if msg.contains("github")));
    }

    #[tokio::test]
    async fn fingerprint_changes_with_repository_id() {
        let mock = MockPlatform::new()
            .with_repo(MockRepo::new("acme/widgets", 1))
            .with_repo(MockRepo::new("acme/gadgets", 2));

        let widgets = mock
            .init_repo(RepoParams {
                repository: "acme/widgets".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let again = mock
            .init_repo(RepoParams {
                repository: "acme/widgets".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let gadgets = mock
            .init_repo(RepoParams {
                repository: "acme/gadgets".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(widgets.repo_fingerprint, again.repo_fingerprint);
        assert_ne!(widgets.repo_fingerprint, gadgets.repo_fingerprint);
    }

    #[tokio::test]
    async fn autodiscovery_filters_and_sorts() {
        let mock = MockPlatform::new()
            .with_repo(MockRepo::new("acme/zeta", 1).with_topics(&["rust"]))
            .with_repo(MockRepo::new("acme/alpha", 2).with_topics(&["rust"]))
            .with_repo(MockRepo::new("other/beta", 3).with_topics(&["rust"]))
            .with_repo(MockRepo::new("acme/gamma", 4));

        let repos = mock
            .get_repos(&AutodiscoverConfig {
                topics: vec!["rust".into()],
                namespaces: vec!["acme".into()],
                sort: Some(RepoSortMethod::Alpha),
                order: Some(SortOrder::Desc),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(repos, vec!["acme/zeta", "acme/alpha"]);
    }

    #[tokio::test]
    async fn injected_failure_surfaces_through_trait_object() {
        let mock = MockPlatform::new().fail_on(FailOn::GetRawFile(PlatformError::Transient(
            "connection reset".into(),
        )));
        let platform: &dyn Platform = &mock;

        let err = platform
            .get_json_file("renovate.json", None, None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn invalid_json_file_is_a_conflict() {
        let mock = MockPlatform::new().with_file("renovate.json", "{ not json");

        let err = mock
            .get_json_file("renovate.json", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Conflict(_)));
    }
}

mod capability_tests {
    use super::*;

    #[tokio::test]
    async fn undeclared_capabilities_are_hidden() {
        let mock = MockPlatform::new().with_capabilities(CapabilitySet::from_iter([
            Capability::LabelLimit,
        ]));

        assert!(mock.supports(Capability::LabelLimit));
        assert!(mock.label_limit().is_some());
        assert!(mock.vulnerability_alerts().is_none());
        assert!(mock.group_members().is_none());
        assert!(mock.pr_refresh().is_none());
        assert!(mock.platform_commit().is_none());
        assert!(mock.fork_sync().is_none());
    }

    #[tokio::test]
    async fn declared_capabilities_are_reachable() {
        let mock = MockPlatform::new().with_capabilities(CapabilitySet::from_iter([
            Capability::PrRefresh,
            Capability::PlatformCommit,
            Capability::ForkSync,
        ]));

        assert!(mock.pr_refresh().is_some());
        assert!(mock.platform_commit().is_some());
        assert!(mock.fork_sync().is_some());
        assert!(mock.label_limit().is_none());
    }

    #[tokio::test]
    async fn refresh_of_unknown_pr_is_not_found() {
        let mock = MockPlatform::with_prs(vec![Pr::new(3, "depbot/serde", "Update serde")]);
        let refresh = mock.pr_refresh().unwrap();

        refresh.refresh_pr(3).await.unwrap();
        assert!(matches!(refresh.refresh_pr(4).await, Err(PlatformError::NotFound(_))));
        assert_eq!(mock.operations(), vec![MockOperation::RefreshPr { number: 3 }]);
    }

    #[tokio::test]
    async fn issue_lookup_ignores_cache_flag() {
        let mock = MockPlatform::new().with_issue("Dashboard", "v1", IssueState::Open);
        let cached = mock.get_issue(1, true).await.unwrap().unwrap();
        let fresh = mock.get_issue(1, false).await.unwrap().unwrap();
        assert_eq!(cached, fresh);
        assert_eq!(mock.get_issue(2, true).await.unwrap(), None);
    }

    fn commit_config(files: Vec<FileChange>, force: bool) -> CommitFilesConfig {
        CommitFilesConfig {
            branch_name: BranchName::new("depbot/serde").unwrap(),
            base_branch: BranchName::new("main").unwrap(),
            files,
            message: "Update serde".into(),
            force,
        }
    }

    #[tokio::test]
    async fn platform_commit_applies_changes_onto_base() {
        let mock = MockPlatform::new().with_branch(
            "main",
            &[("Cargo.toml", "serde = \"1.0.100\""), ("OLD.md", "stale")],
        );
        let committer = mock.platform_commit().unwrap();

        let files = vec![
            FileChange::addition("Cargo.toml", "serde = \"1.0.200\""),
            FileChange::Deletion {
                path: "OLD.md".into(),
            },
        ];
        let sha = committer
            .commit_files(&commit_config(files.clone(), false))
            .await
            .unwrap()
            .expect("new branch gets a commit");

        assert_eq!(mock.branch_head("depbot/serde").as_deref(), Some(sha.as_str()));
        assert_eq!(
            mock.branch_file("depbot/serde", "Cargo.toml"),
            Some(b"serde = \"1.0.200\"".to_vec())
        );
        assert_eq!(mock.branch_file("depbot/serde", "OLD.md"), None);
        assert_eq!(
            mock.branch_file("main", "Cargo.toml"),
            Some(b"serde = \"1.0.100\"".to_vec())
        );

        // Same content again is a no-op unless forced
        let again = committer
            .commit_files(&commit_config(files.clone(), false))
            .await
            .unwrap();
        assert_eq!(again, None);
        assert_eq!(mock.branch_head("depbot/serde").as_deref(), Some(sha.as_str()));

        let forced = committer
            .commit_files(&commit_config(files, true))
            .await
            .unwrap()
            .unwrap();
        assert_ne!(forced, sha);
        assert_eq!(mock.branch_head("depbot/serde").as_deref(), Some(forced.as_str()));
    }

    #[tokio::test]
    async fn platform_commit_needs_base_branch() {
        let mock = MockPlatform::new();
        let result = mock
            .platform_commit()
            .unwrap()
            .commit_files(&commit_config(Vec::new(), false))
            .await;
        assert!(matches!(result, Err(PlatformError::NotFound(_))));
        assert!(mock.operations().is_empty());
    }

    #[tokio::test]
    async fn fork_sync_only_applies_to_forks() {
        let fork = MockRepo {
            is_fork: true,
            ..MockRepo::new("bot/widgets", 7)
        };
        let mock = MockPlatform::new()
            .with_repo(fork)
            .with_repo(MockRepo::new("acme/widgets", 1));
        let sync = mock.fork_sync().unwrap();

        assert!(matches!(
            sync.sync_fork_with_upstream("main").await,
            Err(PlatformError::Conflict(_))
        ));

        mock.init_repo(RepoParams {
            repository: "acme/widgets".into(),
            ..Default::default()
        })
        .await
        .unwrap();
        assert!(matches!(
            sync.sync_fork_with_upstream("main").await,
            Err(PlatformError::Conflict(_))
        ));

        mock.init_repo(RepoParams {
            repository: "bot/widgets".into(),
            ..Default::default()
        })
        .await
        .unwrap();
        sync.sync_fork_with_upstream("main").await.unwrap();
        assert_eq!(
            mock.operations().last(),
            Some(&MockOperation::SyncFork {
                base_branch: "main".into()
            })
        );
    }

    #[tokio::test]
    async fn code_owner_rules_pick_most_specific_match() {
        let mock = MockPlatform::new();
        let rules = mock
            .code_owner_rules()
            .expect("mock parses CODEOWNERS")
            .extract_rules_from_code_owners_lines(&[
                "# owners".to_string(),
                "* @everyone".to_string(),
                "docs/*.md @writers".to_string(),
            ]);

        assert_eq!(rules.len(), 2);
        let best = rules
            .iter()
            .filter(|r| r.matches("docs/intro.md"))
            .max_by_key(|r| r.score)
            .unwrap();
        assert_eq!(best.usernames, vec!["@writers"]);
    }

    #[tokio::test]
    async fn unavailable_users_are_filtered() {
        let mock = MockPlatform::new().with_unavailable_user("on-leave");
        let users = mock
            .user_availability()
            .unwrap()
            .filter_unavailable_users(&["alice".to_string(), "on-leave".to_string()])
            .await
            .unwrap();
        assert_eq!(users, vec!["alice"]);
    }
}
