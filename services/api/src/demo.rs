use crate::infra::{assemble, seed_sample_notices};
use chrono::{Local, NaiveDate};
use clap::Args;
use notice_stage::config::StageChangeConfig;
use notice_stage::error::AppError;
use notice_stage::workflows::stage_change::{
    BatchItem, BatchRequest, BatchResult, FixedClock, LogNotificationSender, NoticeNumber,
    NoticeRepository, PartnerChangeRequest, ScheduledProgressionRequest,
    ScheduledProgressionSummary, SearchCriteria, SearchOutcome, Stage, StageChangeError,
    ValidationOutcome, ValidationRequest,
};
use notice_stage::workflows::stage_change::validation::NoticeToValidate;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Processing date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Directory the demo change report is written to.
    #[arg(long)]
    pub(crate) report_dir: Option<PathBuf>,
    /// Print the channel outcomes as JSON instead of a summary.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DemoOutput {
    processing_date: NaiveDate,
    search: SearchOutcome,
    validation: ValidationOutcome,
    batch: BatchResult,
    repeat_batch: BatchResult,
    partner: String,
    scheduled: ScheduledProgressionSummary,
    notifications_delivered: usize,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        report_dir,
        json,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let now = today
        .and_hms_opt(9, 0, 0)
        .unwrap_or_else(|| today.and_time(chrono::NaiveTime::MIN));

    let mut config = StageChangeConfig::from_env()?;
    if let Some(dir) = report_dir {
        config.report_dir = dir;
    }

    let sender = Arc::new(LogNotificationSender::new(
        config.notify_recipients.clone(),
        config.notify_subject_prefix.clone(),
    ));
    let mut assembled = assemble(&config, sender, Arc::new(FixedClock(now)));
    seed_sample_notices(&assembled.stores, now).map_err(StageChangeError::from)?;
    let service = assembled.service.clone();

    let search = service
        .search_notices(&SearchCriteria {
            vehicle_no: Some("SGX4321B".to_string()),
            ..SearchCriteria::default()
        })
        .map_err(StageChangeError::from)?;

    let validation = service.validate_notices(&ValidationRequest {
        new_processing_stage: Some(Stage::Dr3.code().to_string()),
        reason_of_change: Some("SUP".to_string()),
        remarks: Some("Driver furnished, escalate to final reminder".to_string()),
        notices: ["500500303J", "500500305L"]
            .into_iter()
            .map(|notice_no| NoticeToValidate {
                notice_no: notice_no.to_string(),
                ..NoticeToValidate::default()
            })
            .collect(),
    })?;

    let request = BatchRequest {
        items: vec![
            BatchItem {
                reason_code: Some("SUP".to_string()),
                remark: Some("Driver furnished".to_string()),
                dh_mha_check: Some(true),
                ..BatchItem::new("500500303J", Some("DR3"))
            },
            BatchItem::new("500500305L", Some("RD1")),
        ],
    };
    let batch = service.process_batch(request.clone(), "demo.officer")?;
    let repeat_batch = service.process_batch(request, "demo.officer")?;

    let scheduled = service.progress_scheduled(&ScheduledProgressionRequest {
        notice_numbers: vec!["500500304K".to_string(), "500500306M".to_string()],
        current_stage: Stage::Rd1,
        processing_date: None,
    });

    let partner = match service.apply_partner_change(&PartnerChangeRequest {
        notice_no: vec!["500500304K".to_string()],
        last_stage_name: Stage::Rd1.code().to_string(),
        next_stage_name: Stage::Rd2.code().to_string(),
        offence_type: Some("O".to_string()),
        source: "001".to_string(),
    }) {
        Ok(outcome) => format!("{outcome:?}"),
        Err(err) => format!("rejected ({}): {err}", err.code()),
    };

    let notifications_delivered = assembled.worker.drain();
    let output = DemoOutput {
        processing_date: today,
        search,
        validation,
        batch,
        repeat_batch,
        partner,
        scheduled,
        notifications_delivered,
    };

    if json {
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{json}"),
            Err(err) => println!("Demo payload unavailable: {err}"),
        }
        return Ok(());
    }

    render_demo(&output);
    if let Ok(Some(notice)) = assembled
        .stores
        .notices
        .fetch(&NoticeNumber::new("500500303J"))
    {
        println!(
            "\nNotice {} now at {} (amount payable {})",
            notice.notice_no,
            notice
                .current_stage()
                .map(|stage| stage.code())
                .unwrap_or("-"),
            notice
                .amount_payable
                .map(|amount| amount.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}

fn render_demo(output: &DemoOutput) {
    println!("Change processing stage demo ({})", output.processing_date);

    println!("\nSearch by vehicle");
    for hit in &output.search.eligible_notices {
        println!("- {} eligible", hit.notice_no);
    }
    for hit in &output.search.ineligible_notices {
        println!(
            "- {} ineligible: {} ({})",
            hit.notice.notice_no, hit.reason_message, hit.reason_code
        );
    }

    println!("\nValidation");
    for notice in &output.validation.changeable_notices {
        println!("- {} -> {}", notice.notice_no, notice.chosen_stage);
    }
    for notice in &output.validation.non_changeable_notices {
        println!(
            "- {} blocked: {} ({})",
            notice.notice_no,
            notice.message,
            notice.code.as_str()
        );
    }

    for (label, batch) in [
        ("Portal batch", &output.batch),
        ("Repeat batch", &output.repeat_batch),
    ] {
        println!(
            "\n{label}: {:?} ({} of {} succeeded)",
            batch.status, batch.summary.succeeded, batch.summary.requested
        );
        for result in &batch.results {
            println!(
                "- {} {:?} {}",
                result.notice_no,
                result.outcome,
                result.message.as_deref().unwrap_or_default()
            );
        }
        if let Some(url) = &batch.report_url {
            println!("  Report: {url}");
        }
    }

    println!("\nPartner push: {}", output.partner);
    println!(
        "Scheduled run: {} automatic, {} manual, {} skipped",
        output.scheduled.automatic, output.scheduled.manual, output.scheduled.skipped
    );
    for error in &output.scheduled.errors {
        println!("- {error}");
    }
    println!(
        "Failure notifications delivered: {}",
        output.notifications_delivered
    );
}
