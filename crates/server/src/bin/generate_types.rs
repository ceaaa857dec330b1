//! Print TypeScript declarations for the API types.
//!
//! `generate_types` writes to stdout; `generate_types --out shared/types.ts` writes a file.

use std::{env, fs, path::PathBuf};

use anyhow::{Context, bail};
use db::models::{
    activity::{Activity, ActivityFilters, ActivityType, ActivityTypeCount, CreateActivity},
    call_note::{CallNote, CallNoteFilters, CallOutcome, CreateCallNote, UpdateCallNote},
    company::{Company, CreateCompany, UpdateCompany},
    customer::{CreateCustomer, Customer, CustomerFilters, CustomerStatus, UpdateCustomer},
    deal::{ClosedDealsSummary, CreateDeal, Deal, DealFilters, DealStage, StageSummary, UpdateDeal},
    task::{CreateTask, Task, TaskFilters, TaskPriority, TaskStatus, UpdateTask},
    team::{CreateTeam, Team, UpdateTeam},
    team_insight::{InsightSource, TeamInsight},
    user::{CreateUser, UpdateUser, User, UserRole},
};
use server::routes::{
    auth::ChangePasswordRequest, deals::StageChange, health::HealthStatus, tasks::StatusChange,
};
use services::services::{
    auth::{LoginRequest, LoginResponse, SessionToken},
    capacity::{CapacityStatus, StatusCounts, TeamCapacityInfo, UserCapacityInfo},
    dashboard::{DashboardSummary, PipelineOverview},
    insights::{GeneratedInsight, TeamMetrics},
};
use ts_rs::TS;
use utils::{
    date_range::{DateRange, TimeFilter, TimeFilterQuery},
    response::ApiResponse,
};

fn declarations() -> Vec<String> {
    vec![
        ApiResponse::<()>::decl(),
        DateRange::decl(),
        TimeFilter::decl(),
        TimeFilterQuery::decl(),
        HealthStatus::decl(),
        UserRole::decl(),
        User::decl(),
        CreateUser::decl(),
        UpdateUser::decl(),
        LoginRequest::decl(),
        LoginResponse::decl(),
        SessionToken::decl(),
        ChangePasswordRequest::decl(),
        Team::decl(),
        CreateTeam::decl(),
        UpdateTeam::decl(),
        Company::decl(),
        CreateCompany::decl(),
        UpdateCompany::decl(),
        CustomerStatus::decl(),
        Customer::decl(),
        CreateCustomer::decl(),
        UpdateCustomer::decl(),
        CustomerFilters::decl(),
        DealStage::decl(),
        Deal::decl(),
        CreateDeal::decl(),
        UpdateDeal::decl(),
        DealFilters::decl(),
        StageChange::decl(),
        StageSummary::decl(),
        ClosedDealsSummary::decl(),
        PipelineOverview::decl(),
        TaskStatus::decl(),
        TaskPriority::decl(),
        Task::decl(),
        CreateTask::decl(),
        UpdateTask::decl(),
        TaskFilters::decl(),
        StatusChange::decl(),
        CallOutcome::decl(),
        CallNote::decl(),
        CreateCallNote::decl(),
        UpdateCallNote::decl(),
        CallNoteFilters::decl(),
        ActivityType::decl(),
        Activity::decl(),
        CreateActivity::decl(),
        ActivityFilters::decl(),
        ActivityTypeCount::decl(),
        CapacityStatus::decl(),
        StatusCounts::decl(),
        UserCapacityInfo::decl(),
        TeamCapacityInfo::decl(),
        DashboardSummary::decl(),
        InsightSource::decl(),
        TeamInsight::decl(),
        TeamMetrics::decl(),
        GeneratedInsight::decl(),
    ]
}

fn render() -> String {
    let mut out = String::from("// Generated by `generate_types`. Do not edit.\n\n");
    for decl in declarations() {
        out.push_str("export ");
        out.push_str(&decl);
        out.push_str("\n\n");
    }
    out
}

fn main() -> anyhow::Result<()> {
    let mut args = env::args().skip(1);
    let out: Option<PathBuf> = match args.next().as_deref() {
        None => None,
        Some("--out") => Some(args.next().context("--out needs a path")?.into()),
        Some(other) => bail!("unknown argument: {other}"),
    };

    let rendered = render();
    match out {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
            }
            fs::write(&path, rendered).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}
