// GraphQL schema executed directly against a seeded in-memory store
use async_graphql::{Request, Variables};
use serde_json::{json, Value};

use bhimdatta::accounts::{
    AccountRepository, DynAccountRepository, Email, Identity, SqliteAccountRepository,
};
use bhimdatta::db;
use bhimdatta::graphql::{build_schema, with_context, BhimdattaSchema};
use bhimdatta::problems::{DynProblemRepository, SqliteProblemRepository};

struct Harness {
    schema: BhimdattaSchema,
    problems: DynProblemRepository,
    accounts: DynAccountRepository,
}

async fn harness() -> Harness {
    let pool = db::create_memory_pool().unwrap();
    db::run_migrations(&pool).unwrap();
    let accounts: DynAccountRepository = std::sync::Arc::new(SqliteAccountRepository::new(pool.clone()));
    let problems: DynProblemRepository = std::sync::Arc::new(SqliteProblemRepository::new(pool));
    db::seed::seed_demo(accounts.as_ref(), problems.as_ref(), 4)
        .await
        .unwrap();
    Harness {
        schema: build_schema(),
        problems,
        accounts,
    }
}

impl Harness {
    async fn identity(&self, email: &str) -> Identity {
        let (identity, _) = self
            .accounts
            .find_by_email(&Email::parse(email).unwrap())
            .await
            .unwrap()
            .unwrap();
        identity
    }

    async fn citizen(&self) -> Identity {
        self.identity(db::seed::DEMO_CITIZEN_EMAIL).await
    }

    async fn agent(&self) -> Identity {
        self.identity(db::seed::DEMO_AGENT_EMAIL).await
    }

    /// Run a query and return (data, error messages)
    async fn run(&self, query: &str, vars: Value, viewer: Option<Identity>) -> (Value, Vec<String>) {
        let request = with_context(
            Request::new(query).variables(Variables::from_json(vars)),
            self.problems.clone(),
            viewer,
        );
        let response = self.schema.execute(request).await;
        let errors = response.errors.iter().map(|e| e.message.clone()).collect();
        (response.data.into_json().unwrap(), errors)
    }

    async fn first_id(&self, status: &str) -> String {
        let (data, _) = self
            .run(
                "query($s: ProblemStatus) { problems(status: $s) { id } }",
                json!({ "s": status }),
                None,
            )
            .await;
        data["problems"][0]["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn feed_lists_newest_first() {
    let h = harness().await;
    let (data, errors) = h
        .run(
            "{ problems { title status statusLabel commentCount } }",
            json!({}),
            None,
        )
        .await;
    assert!(errors.is_empty(), "{:?}", errors);
    assert_eq!(
        data["problems"],
        json!([
            { "title": "Pothole on Highway", "status": "OBSERVED", "statusLabel": "Under Observation", "commentCount": 2 },
            { "title": "Garbage Collection Issue", "status": "WATCHED", "statusLabel": "Watched", "commentCount": 1 },
            { "title": "Broken Street Light", "status": "PENDING", "statusLabel": "Pending", "commentCount": 0 },
        ])
    );
}

#[tokio::test]
async fn feed_filters_combine() {
    let h = harness().await;
    let (data, _) = h
        .run(
            "query($q: String, $s: ProblemStatus) { problems(search: $q, status: $s) { title } }",
            json!({ "q": "residential", "s": "WATCHED" }),
            None,
        )
        .await;
    assert_eq!(
        data["problems"],
        json!([{ "title": "Garbage Collection Issue" }])
    );

    let (data, _) = h
        .run(
            "query($q: String, $s: ProblemStatus) { problems(search: $q, status: $s) { title } }",
            json!({ "q": "residential", "s": "PENDING" }),
            None,
        )
        .await;
    assert_eq!(data["problems"], json!([]));
}

#[tokio::test]
async fn unknown_problem_is_null() {
    let h = harness().await;
    let (data, errors) = h
        .run("{ problem(id: \"missing\") { id } }", json!({}), None)
        .await;
    assert!(errors.is_empty());
    assert_eq!(data["problem"], Value::Null);
}

#[tokio::test]
async fn citizen_cannot_update_status() {
    let h = harness().await;
    let id = h.first_id("PENDING").await;
    let (_, errors) = h
        .run(
            "mutation($id: ID!) { updateProblemStatus(id: $id, status: SUCCESS) { status } }",
            json!({ "id": id }),
            Some(h.citizen().await),
        )
        .await;
    assert_eq!(
        errors,
        ["Only municipality agents can update problem status"]
    );

    let (data, _) = h
        .run(
            "query($id: ID!) { problem(id: $id) { status } }",
            json!({ "id": id }),
            None,
        )
        .await;
    assert_eq!(data["problem"]["status"], "PENDING");
}

#[tokio::test]
async fn agent_resolves_report() {
    let h = harness().await;
    let id = h.first_id("PENDING").await;
    let (data, errors) = h
        .run(
            "mutation($id: ID!) { updateProblemStatus(id: $id, status: SUCCESS) { status statusLabel } }",
            json!({ "id": id }),
            Some(h.agent().await),
        )
        .await;
    assert!(errors.is_empty(), "{:?}", errors);
    assert_eq!(data["updateProblemStatus"]["status"], "SUCCESS");
    assert_eq!(data["updateProblemStatus"]["statusLabel"], "Resolved");

    let (data, _) = h
        .run("{ dashboardStats { total pending resolved } }", json!({}), Some(h.agent().await))
        .await;
    assert_eq!(
        data["dashboardStats"],
        json!({ "total": 3, "pending": 0, "resolved": 1 })
    );
}

#[tokio::test]
async fn comments_need_a_viewer() {
    let h = harness().await;
    let id = h.first_id("WATCHED").await;
    let query = "mutation($id: ID!, $t: String!) { addComment(problemId: $id, text: $t) { text authorName } }";

    let (_, errors) = h
        .run(query, json!({ "id": id, "t": "Any update?" }), None)
        .await;
    assert_eq!(errors, ["Not authenticated"]);

    let (data, errors) = h
        .run(
            query,
            json!({ "id": id, "t": "Any update?" }),
            Some(h.citizen().await),
        )
        .await;
    assert!(errors.is_empty(), "{:?}", errors);
    assert_eq!(
        data["addComment"],
        json!({ "text": "Any update?", "authorName": "John Doe" })
    );
}

#[tokio::test]
async fn dashboard_stats_are_agent_only() {
    let h = harness().await;
    let (_, errors) = h
        .run("{ dashboardStats { total } }", json!({}), Some(h.citizen().await))
        .await;
    assert_eq!(errors, ["Only municipality agents can view the dashboard"]);
}

#[tokio::test]
async fn me_reflects_viewer() {
    let h = harness().await;
    let (data, _) = h.run("{ me { name } }", json!({}), None).await;
    assert_eq!(data["me"], Value::Null);

    let (data, _) = h
        .run("{ me { name role } }", json!({}), Some(h.agent().await))
        .await;
    assert_eq!(data["me"], json!({ "name": "Agent Smith", "role": "AGENT" }));
}
