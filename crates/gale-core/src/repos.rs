//! # Multi-Repository Operations
//!
//! Keeping the Gale repositories on the same branch, and committing across
//! all of them at once. Upstream projects (forks) are never touched.
//!
//! Two ways to reach the repositories:
//! - [`RepoScope::UserProjects`]: run in every user project gale knows about
//! - [`RepoScope::WestGroup`]: let `west forall` walk a manifest group, then
//!   repeat in the manifest repository (which `west forall` skips)

use std::path::PathBuf;

use crate::command::{CmdMode, CommandSpec, shell_quote};
use crate::layout::WorkspaceLayout;
use crate::registry::Project;

/// Default manifest group holding the Gale repositories.
pub const DEFAULT_GROUP: &str = "gale";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoScope {
    UserProjects,
    WestGroup(String),
}

/// Shell command switching to `branch`, tracking the remote if needed.
pub fn checkout_command(branch: &str) -> String {
    let branch_q = shell_quote(branch);
    let remote_q = shell_quote(&format!("origin/{}", branch));
    format!(
        "git fetch && git switch {} || git switch --track {}",
        branch_q, remote_q
    )
}

/// Shell command committing everything and pushing. Repositories without
/// changes (untracked files included) are skipped with a zero exit status.
pub fn push_command(message: &str) -> String {
    format!(
        "test -z \"$(git status --porcelain)\" || {{ git add . && git commit -m {} && git push; }}",
        shell_quote(message)
    )
}

/// One non-fatal command per repository in scope.
pub fn plan(layout: &WorkspaceLayout, scope: &RepoScope, subcmd: &str, desc: &str) -> Vec<CommandSpec> {
    match scope {
        RepoScope::UserProjects => Project::user_projects()
            .map(|project| {
                CommandSpec::new(subcmd, format!("{} ({})", desc, project), CmdMode::Foreground)
                    .in_dir(project.dir(layout))
                    .non_fatal()
            })
            .collect(),
        RepoScope::WestGroup(group) => {
            let forall = format!(
                "west forall -g {} -c {}",
                shell_quote(group),
                shell_quote(subcmd)
            );
            let manifest_dir: PathBuf = layout.manifest_dir().to_path_buf();
            vec![
                CommandSpec::new(forall, format!("{} (group '{}')", desc, group), CmdMode::Foreground)
                    .in_dir(layout.topdir())
                    .non_fatal(),
                CommandSpec::new(subcmd, format!("{} (manifest)", desc), CmdMode::Foreground)
                    .in_dir(manifest_dir)
                    .non_fatal(),
            ]
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn checkout_falls_back_to_tracking() {
        assert_eq!(
            checkout_command("feature/uart"),
            "git fetch && git switch feature/uart || git switch --track origin/feature/uart"
        );
    }

    #[test]
    fn push_quotes_message() {
        assert_eq!(
            push_command("Fix sensor polling"),
            "test -z \"$(git status --porcelain)\" || \
             { git add . && git commit -m 'Fix sensor polling' && git push; }"
        );
    }

    fn git(dir: &std::path::Path, args: &[&str]) -> std::process::Output {
        std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_AUTHOR_NAME", "Gale")
            .env("GIT_AUTHOR_EMAIL", "gale@example.com")
            .env("GIT_COMMITTER_NAME", "Gale")
            .env("GIT_COMMITTER_EMAIL", "gale@example.com")
            .output()
            .unwrap()
    }

    fn commit_count(dir: &std::path::Path) -> String {
        String::from_utf8(git(dir, &["rev-list", "--count", "HEAD"]).stdout)
            .unwrap()
            .trim()
            .to_string()
    }

    #[test]
    fn push_skips_clean_repositories() {
        let temp = tempfile::tempdir().unwrap();
        let repo = temp.path();
        assert!(git(repo, &["init", "-q"]).status.success());
        std::fs::write(repo.join("prj.conf"), "CONFIG_LOG=y\n").unwrap();
        git(repo, &["add", "prj.conf"]);
        assert!(git(repo, &["commit", "-q", "-m", "Initial"]).status.success());

        let run = |dir: &std::path::Path| {
            std::process::Command::new("sh")
                .arg("-c")
                .arg(push_command("Bump versions"))
                .current_dir(dir)
                .env("GIT_AUTHOR_NAME", "Gale")
                .env("GIT_AUTHOR_EMAIL", "gale@example.com")
                .env("GIT_COMMITTER_NAME", "Gale")
                .env("GIT_COMMITTER_EMAIL", "gale@example.com")
                .output()
                .unwrap()
        };

        // Nothing to commit: no commit, no push attempt, success.
        assert!(run(repo).status.success());
        assert_eq!(commit_count(repo), "1");

        // An untracked file is committed; the push then fails for lack of a remote.
        std::fs::write(repo.join("notes.txt"), "wip\n").unwrap();
        assert!(!run(repo).status.success());
        assert_eq!(commit_count(repo), "2");
    }

    #[test]
    fn user_projects_scope_skips_upstream() {
        let layout = WorkspaceLayout::from_topdir("/ws");
        let cmds = plan(&layout, &RepoScope::UserProjects, "git status", "Status");
        assert_eq!(cmds.len(), 4);
        assert!(cmds.iter().all(|c| !c.fatal));
        assert!(
            cmds.iter()
                .all(|c| c.cwd != Some(Project::Zephyr.dir(&layout)))
        );
    }

    #[test]
    fn west_group_scope_includes_manifest_repo() {
        let layout = WorkspaceLayout::from_topdir("/ws");
        let cmds = plan(
            &layout,
            &RepoScope::WestGroup(DEFAULT_GROUP.to_string()),
            &checkout_command("main"),
            "Checkout",
        );
        assert_eq!(cmds.len(), 2);
        assert_eq!(
            cmds[0].cmd,
            "west forall -g gale -c 'git fetch && git switch main || git switch --track origin/main'"
        );
        assert_eq!(cmds[1].cwd.as_deref(), Some(layout.manifest_dir()));
    }
}
