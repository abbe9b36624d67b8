use manygit::{
    ClientOptions, CommitState, ConnectionManager, Credential, ManygitConfig,
    ManygitError,
};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::runtime::Runtime;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

const SHA: &str = "6dcb09b5b57875f334f61aebed695e2e4193db5e";

fn trunk_branch() -> Value {
    json!({
        "name": "trunk",
        "commit": {
            "sha": SHA,
            "url": format!("https://ghe.example.com/api/v3/repos/acme/widget/commits/{SHA}")
        },
        "protected": false
    })
}

struct EnterpriseHost {
    rt: Runtime,
    server: MockServer,
}

impl EnterpriseHost {
    fn start() -> Self {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let server = rt.block_on(MockServer::start());
        Self { rt, server }
    }

    fn mount(&self, mock: Mock) {
        self.rt.block_on(mock.mount(&self.server));
    }

    /// Remote URL of a repository on the mocked instance.
    fn repo_url(&self, repo: &str) -> String {
        let address = self.server.address();
        format!("https://{}:{}/{repo}", address.ip(), address.port())
    }

    fn mount_widget(&self) {
        self.mount(
            Mock::given(method("GET"))
                .and(path("/api/v3/repos/acme/widget"))
                .and(header("authorization", "Bearer ghe_token"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id": 7,
                    "name": "widget",
                    "url": "https://ghe.example.com/api/v3/repos/acme/widget",
                    "default_branch": "trunk"
                }))),
        );
        self.mount(
            Mock::given(method("GET"))
                .and(path("/api/v3/repos/acme/widget/branches/trunk"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(trunk_branch()),
                ),
        );
        self.mount(
            Mock::given(method("GET"))
                .and(path(format!("/api/v3/repos/acme/widget/commits/{SHA}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "sha": SHA,
                    "parents": []
                }))),
        );
        self.mount(
            Mock::given(method("GET"))
                .and(path(format!(
                    "/api/v3/repos/acme/widget/commits/{SHA}/statuses"
                )))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                    { "context": "ci/build", "state": "failure" }
                ]))),
        );
    }
}

fn enterprise_manager(host: &EnterpriseHost) -> ConnectionManager {
    let credential =
        Credential::github_enterprise(&host.server.uri(), "ghe_token").unwrap();

    let mut manager = ConnectionManager::with_options(
        ClientOptions::with_timeout(Duration::from_secs(5)),
    );
    manager.add_connection(credential);
    manager
}

#[test_log::test]
fn get_repo_against_enterprise_instance() {
    let host = EnterpriseHost::start();
    host.mount_widget();

    let manager = enterprise_manager(&host);
    let repo = manager.get_repo(&host.repo_url("acme/widget")).unwrap();

    assert_eq!(repo.owner, "acme");
    assert_eq!(repo.name, "widget");
    assert_eq!(repo.default_branch.name, "trunk");
    assert_eq!(repo.default_branch.head.sha, SHA);
    assert!(repo.default_branch.head.parents.is_empty());

    let statuses = &repo.default_branch.head.statuses;
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].context, "ci/build");
    assert_eq!(statuses[0].status, CommitState::Failure);
}

#[test_log::test]
fn repeated_queries_hit_the_host_each_time() {
    let host = EnterpriseHost::start();
    host.mount(
        Mock::given(method("GET"))
            .and(path("/api/v3/repos/acme/widget/branches"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([trunk_branch()])),
            )
            .expect(2),
    );

    let manager = enterprise_manager(&host);
    let url = host.repo_url("acme/widget");

    assert_eq!(manager.list_branches(&url).unwrap(), vec!["trunk"]);
    assert_eq!(manager.list_branches(&url).unwrap(), vec!["trunk"]);

    host.rt.block_on(host.server.verify());
}

#[test_log::test]
fn missing_repository_on_enterprise_instance() {
    let host = EnterpriseHost::start();
    host.mount(
        Mock::given(method("GET"))
            .and(path("/api/v3/repos/acme/ghost"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "message": "Not Found"
            }))),
    );

    let manager = enterprise_manager(&host);
    let err = manager.get_repo(&host.repo_url("acme/ghost")).unwrap_err();

    assert!(matches!(err, ManygitError::RepositoryNotFound(_)));
}

#[test_log::test]
fn github_dot_com_credential_does_not_cover_enterprise() {
    let host = EnterpriseHost::start();

    let mut manager = ConnectionManager::new();
    manager.add_connection(
        manygit::GitHubPersonalAccessTokenAuth::new("ghp_token").unwrap(),
    );

    let err = manager.get_repo(&host.repo_url("acme/widget")).unwrap_err();

    assert!(matches!(err, ManygitError::NoCredential(_)));
}

#[test_log::test]
fn manager_from_configuration() {
    let host = EnterpriseHost::start();
    host.mount_widget();

    let config = ManygitConfig::from_toml_str(&format!(
        r#"
timeout_secs = 5

[[connection]]
host = "github"
token = "ghe_token"
enterprise_url = "{}"
"#,
        host.server.uri()
    ))
    .unwrap();

    let manager = config.into_manager().unwrap();
    let repo = manager.get_repo(&host.repo_url("acme/widget")).unwrap();

    assert_eq!(repo.default_branch.name, "trunk");
}

#[test_log::test]
fn html_error_page_keeps_status() {
    let host = EnterpriseHost::start();
    host.mount(
        Mock::given(method("GET"))
            .and(path("/api/v3/repos/acme/widget"))
            .respond_with(
                ResponseTemplate::new(503)
                    .set_body_string("<html><body>Maintenance</body></html>"),
            ),
    );

    let manager = enterprise_manager(&host);
    let err = manager.get_repo(&host.repo_url("acme/widget")).unwrap_err();

    assert!(matches!(err, ManygitError::HostUnavailable(_)));
}
