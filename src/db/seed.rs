// Demo accounts and sample reports for a fresh install
use chrono::{Duration, Utc};

use crate::accounts::{AccountRepository, Email, Identity, Role};
use crate::auth::password::hash_password;
use crate::problems::{Media, MediaKind, Problem, ProblemDraft, ProblemRepository, ProblemStatus};

pub const DEMO_PASSWORD: &str = "password";
pub const DEMO_CITIZEN_EMAIL: &str = "user@example.com";
pub const DEMO_AGENT_EMAIL: &str = "agent@bhimdatta.gov.np";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub accounts: usize,
    pub problems: usize,
}

/// Insert the demo citizen, the demo agent and three sample reports.
/// Anything already present is left alone.
pub async fn seed_demo(
    accounts: &dyn AccountRepository,
    problems: &dyn ProblemRepository,
    bcrypt_cost: u32,
) -> anyhow::Result<SeedReport> {
    let mut report = SeedReport::default();

    let (citizen, created) =
        ensure_account(accounts, DEMO_CITIZEN_EMAIL, "John Doe", Role::Citizen, bcrypt_cost)
            .await?;
    report.accounts += usize::from(created);
    let (agent, created) =
        ensure_account(accounts, DEMO_AGENT_EMAIL, "Agent Smith", Role::Agent, bcrypt_cost)
            .await?;
    report.accounts += usize::from(created);

    if problems.count().await? == 0 {
        for problem in sample_problems(&citizen, &agent)? {
            problems.insert(&problem).await?;
            report.problems += 1;
        }
    }

    tracing::info!(
        "Demo seed: {} account(s), {} report(s) added",
        report.accounts,
        report.problems
    );
    Ok(report)
}

async fn ensure_account(
    accounts: &dyn AccountRepository,
    email: &str,
    name: &str,
    role: Role,
    bcrypt_cost: u32,
) -> anyhow::Result<(Identity, bool)> {
    let email = Email::parse(email)?;
    if let Some((identity, _)) = accounts.find_by_email(&email).await? {
        return Ok((identity, false));
    }

    let mut identity = Identity::register(email, name, Utc::now())?;
    identity.role = role;
    let hash = hash_password(DEMO_PASSWORD, bcrypt_cost).await?;
    accounts.create(&identity, &hash).await?;
    Ok((identity, true))
}

fn media(kind: MediaKind, url: &str) -> Media {
    Media {
        id: uuid::Uuid::now_v7().to_string(),
        kind,
        url: url.to_string(),
    }
}

fn sample_problems(citizen: &Identity, agent: &Identity) -> anyhow::Result<Vec<Problem>> {
    let now = Utc::now();
    let days_ago = |days: i64| now - Duration::days(days);

    let street_light = Problem::open(
        ProblemDraft {
            title: "Broken Street Light".into(),
            description: "The street light at the corner of Main St and Park Ave has been broken for two weeks.".into(),
            location: "Main St & Park Ave, Bhimdatta".into(),
            media: vec![media(
                MediaKind::Image,
                "https://images.unsplash.com/photo-1470071459604-3b5ec3a7fe05",
            )],
        },
        citizen,
        days_ago(7),
    )?;

    let mut garbage = Problem::open(
        ProblemDraft {
            title: "Garbage Collection Issue".into(),
            description: "Garbage has not been collected from Residential Area 3 for the past week.".into(),
            location: "Residential Area 3, Bhimdatta".into(),
            media: vec![media(
                MediaKind::Image,
                "https://images.unsplash.com/photo-1621792907526-eb05770eeb62",
            )],
        },
        citizen,
        days_ago(3),
    )?;
    garbage.add_comment(
        "We have noted this issue and dispatched a team.",
        agent,
        days_ago(2),
    )?;
    garbage.transition(ProblemStatus::Watched, agent, days_ago(2))?;

    let mut pothole = Problem::open(
        ProblemDraft {
            title: "Pothole on Highway".into(),
            description: "There is a large pothole on the highway near the city entrance that is causing traffic and vehicle damage.".into(),
            location: "Highway Entrance, Bhimdatta".into(),
            media: vec![
                media(
                    MediaKind::Image,
                    "https://images.unsplash.com/photo-1515162816999-a0c47dc192f7",
                ),
                media(MediaKind::Video, "https://example.com/video1.mp4"),
            ],
        },
        citizen,
        days_ago(14),
    )?;
    pothole.add_comment(
        "This has been reported to the Highway Department.",
        agent,
        days_ago(10),
    )?;
    pothole.add_comment(
        "Repair team has been scheduled for next week.",
        agent,
        days_ago(1),
    )?;
    pothole.transition(ProblemStatus::Observed, agent, days_ago(1))?;

    Ok(vec![street_light, garbage, pothole])
}
