//! Gitlab webhook payloads.
//!
//! Only the two shapes that carry something to test are understood: `push`
//! and `merge_request`. Both are reduced to a [`Trigger`]: what to clone,
//! which branch, and the commit metadata recorded in the history.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors turning a request body into a [`Trigger`].
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Not JSON, unknown `object_kind`, or a required field is missing.
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A push whose `after` commit is not among its `commits`.
    #[error("Commit '{0}' not found in push payload")]
    CommitNotFound(String),

    /// No branch name could be derived.
    #[error("No branch in ref '{0}'")]
    MissingBranch(String),
}

/// Webhook body, discriminated by `object_kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "object_kind", rename_all = "snake_case")]
pub enum GitlabEvent {
    Push(PushEvent),
    MergeRequest(MergeRequestEvent),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub after: String,
    pub project: Project,
    #[serde(default)]
    pub commits: Vec<Commit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequestEvent {
    pub object_attributes: MergeRequestAttributes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequestAttributes {
    pub id: u64,
    pub source_branch: String,
    pub source: Project,
    pub last_commit: Commit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub git_http_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub author: Option<CommitAuthor>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// What a webhook asks to be tested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub repository: String,
    pub branch: String,
    /// Merge request reference such as `#42`; absent for pushes.
    pub id: Option<String>,
    pub commit: Commit,
}

impl GitlabEvent {
    pub fn parse(body: &[u8]) -> Result<Self, PayloadError> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn into_trigger(self) -> Result<Trigger, PayloadError> {
        match self {
            Self::MergeRequest(event) => {
                let merge = event.object_attributes;
                Ok(Trigger {
                    repository: merge.source.git_http_url,
                    branch: merge.source_branch,
                    id: Some(format!("#{}", merge.id)),
                    commit: merge.last_commit,
                })
            }
            Self::Push(event) => {
                let branch = branch_from_ref(&event.git_ref)
                    .ok_or_else(|| PayloadError::MissingBranch(event.git_ref.clone()))?
                    .to_string();
                let commit = event
                    .commits
                    .into_iter()
                    .find(|c| c.id == event.after)
                    .ok_or(PayloadError::CommitNotFound(event.after))?;
                Ok(Trigger {
                    repository: event.project.git_http_url,
                    branch,
                    id: None,
                    commit,
                })
            }
        }
    }
}

/// `refs/heads/feature/x` -> `feature/x`; any other ref -> its last segment.
fn branch_from_ref(git_ref: &str) -> Option<&str> {
    let branch = match git_ref.strip_prefix("refs/heads/") {
        Some(rest) => rest,
        None => git_ref.rsplit('/').next().unwrap_or(git_ref),
    };
    (!branch.is_empty()).then_some(branch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn push_body() -> serde_json::Value {
        json!({
            "object_kind": "push",
            "ref": "refs/heads/master",
            "before": "95790bf891e76fee5e1747ab589903a6a1f80f22",
            "after": "da1560886d4f094c3e6c9ef40349f7d38b5d27d7",
            "project": {
                "name": "Diaspora",
                "git_http_url": "http://example.com/mike/diaspora.git"
            },
            "commits": [
                {
                    "id": "b6568db1bc1dcd7f8b4d5a946b0b91f9dacd7327",
                    "message": "Update Catalan translation to e38cb41.",
                    "url": "http://example.com/mike/diaspora/commit/b6568db1",
                    "author": { "name": "Jordi Mallach", "email": "jordi@softcatala.org" }
                },
                {
                    "id": "da1560886d4f094c3e6c9ef40349f7d38b5d27d7",
                    "message": "fixed readme",
                    "url": "http://example.com/mike/diaspora/commit/da156088",
                    "author": { "name": "GitLab dev user", "email": "gitlabdev@dv6700.(none)" }
                }
            ]
        })
    }

    fn merge_body() -> serde_json::Value {
        json!({
            "object_kind": "merge_request",
            "object_attributes": {
                "id": 99,
                "source_branch": "ms-viewport",
                "source": { "git_http_url": "http://example.com/awesome_space/awesome_project.git" },
                "last_commit": {
                    "id": "da1560886d4f094c3e6c9ef40349f7d38b5d27d7",
                    "message": "fixed readme",
                    "url": "http://example.com/awesome_space/awesome_project/commits/da156088",
                    "author": { "name": "GitLab dev user", "email": "gitlabdev@dv6700.(none)" }
                }
            }
        })
    }

    fn trigger(body: serde_json::Value) -> Result<Trigger, PayloadError> {
        GitlabEvent::parse(body.to_string().as_bytes())?.into_trigger()
    }

    #[test]
    fn test_push_trigger() {
        let trigger = trigger(push_body()).unwrap();
        assert_eq!(trigger.repository, "http://example.com/mike/diaspora.git");
        assert_eq!(trigger.branch, "master");
        assert_eq!(trigger.id, None);
        assert_eq!(trigger.commit.id, "da1560886d4f094c3e6c9ef40349f7d38b5d27d7");
        assert_eq!(trigger.commit.message.as_deref(), Some("fixed readme"));
    }

    #[test]
    fn test_merge_request_trigger() {
        let trigger = trigger(merge_body()).unwrap();
        assert_eq!(
            trigger.repository,
            "http://example.com/awesome_space/awesome_project.git"
        );
        assert_eq!(trigger.branch, "ms-viewport");
        assert_eq!(trigger.id.as_deref(), Some("#99"));
        assert_eq!(
            trigger.commit.author.as_ref().map(|a| a.name.as_str()),
            Some("GitLab dev user")
        );
    }

    #[test]
    fn test_push_without_after_commit() {
        let mut body = push_body();
        body["after"] = json!("0000000000000000000000000000000000000000");
        assert!(matches!(trigger(body), Err(PayloadError::CommitNotFound(_))));
    }

    #[test]
    fn test_unknown_kind_is_malformed() {
        let body = json!({ "object_kind": "tag_push" });
        assert!(matches!(trigger(body), Err(PayloadError::Malformed(_))));
    }

    #[test]
    fn test_missing_branch_field_is_malformed() {
        let mut body = merge_body();
        body["object_attributes"]
            .as_object_mut()
            .unwrap()
            .remove("source_branch");
        assert!(matches!(trigger(body), Err(PayloadError::Malformed(_))));
    }

    #[test]
    fn test_not_json_is_malformed() {
        let result = GitlabEvent::parse(b"object_kind=push");
        assert!(matches!(result, Err(PayloadError::Malformed(_))));
    }

    #[test]
    fn test_branch_from_ref() {
        assert_eq!(branch_from_ref("refs/heads/master"), Some("master"));
        assert_eq!(branch_from_ref("refs/heads/feature/login"), Some("feature/login"));
        assert_eq!(branch_from_ref("master"), Some("master"));
        assert_eq!(branch_from_ref("refs/heads/"), None);
    }
}
