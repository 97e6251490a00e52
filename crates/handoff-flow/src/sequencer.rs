//! Guarded stage machine that fills the handoff form

use netclip_event_bus::HandoffRequest;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::FlowConfig;
use crate::errors::FlowError;
use crate::page::HostPage;
use crate::plan::{HeaderRowPlan, RowElements};
use crate::types::{Anchor, DomEvent, ElementHandle, SequenceReport, SequenceStatus, Stage};

/// Result of polling an anchor until its elements satisfy a condition
enum Poll {
    Ready(Vec<ElementHandle>),
    Expired { waited_ms: u64 },
}

/// Anchors derived once from the configured profile
struct Anchors {
    template: Anchor,
    name: Anchor,
    next: Anchor,
    endpoint: Anchor,
    delete_header: Anchor,
    add_header: Anchor,
    header_row: Anchor,
    header_key: Anchor,
    header_value: Anchor,
    header_switch: Anchor,
}

impl Anchors {
    fn from_config(config: &FlowConfig) -> Self {
        let profile = &config.profile;
        Self {
            template: Anchor::text("button", &profile.template_button_text),
            name: Anchor::placeholder("input", &profile.application_name_placeholder),
            next: Anchor::css(&profile.next_button_selector),
            endpoint: Anchor::placeholder("input", &profile.endpoint_placeholder),
            delete_header: Anchor::aria_label("button", &profile.delete_header_label),
            add_header: Anchor::aria_label("button", &profile.add_header_label),
            header_row: Anchor::css(&profile.header_row_selector),
            header_key: Anchor::placeholder("input", &profile.header_key_placeholder),
            header_value: Anchor::placeholder("input", &profile.header_value_placeholder),
            header_switch: Anchor::css(&profile.header_switch_selector),
        }
    }
}

/// Replays a matched exchange into the handoff application's form.
///
/// Each stage waits for an observable condition (element present, row count
/// grown) by polling at `poll_interval_ms` for at most `stage_timeout_ms`.
/// The first stage that cannot proceed ends the run; nothing already done is
/// rolled back.
pub struct HandoffSequencer {
    config: FlowConfig,
    anchors: Anchors,
}

impl HandoffSequencer {
    pub fn new(config: FlowConfig) -> Self {
        let anchors = Anchors::from_config(&config);
        Self { config, anchors }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub async fn run(&self, page: &dyn HostPage, request: &HandoffRequest) -> SequenceReport {
        info!(
            url = %request.url,
            headers = request.headers.len(),
            "handoff sequence started"
        );
        let mut report = SequenceReport::new();
        let mut stage = Some(Stage::OpenTemplate);

        while let Some(current) = stage {
            debug!(stage = %current, "stage started");
            match self.execute_stage(current, page, request, &mut report).await {
                Ok(()) => {
                    report.completed.push(current);
                    stage = current.next(self.config.fill_headers);
                }
                Err(err) => {
                    warn!(stage = %current, error = %err, "handoff sequence aborted");
                    report.status = SequenceStatus::Aborted {
                        stage: current,
                        reason: err.to_string(),
                    };
                    return report;
                }
            }
        }

        info!(
            filled = report.headers_filled,
            skipped = report.headers_skipped,
            "handoff sequence completed"
        );
        report
    }

    async fn execute_stage(
        &self,
        stage: Stage,
        page: &dyn HostPage,
        request: &HandoffRequest,
        report: &mut SequenceReport,
    ) -> Result<(), FlowError> {
        let anchors = &self.anchors;
        match stage {
            Stage::OpenTemplate => {
                let button = self.wait_for(stage, page, &anchors.template).await?;
                page.click(button).await
            }

            Stage::NameApplication => {
                let input = self.wait_for(stage, page, &anchors.name).await?;
                page.fill(input, &self.config.profile.application_name).await
            }

            Stage::Advance => {
                let button = self.wait_for(stage, page, &anchors.next).await?;
                page.click(button).await
            }

            Stage::FillEndpoint => {
                let input = self.wait_for(stage, page, &anchors.endpoint).await?;
                page.fill(input, &request.url).await
            }

            Stage::ClearDefaultHeader => self.clear_default_header(stage, page).await,

            Stage::AddHeaderRows => self.add_header_rows(stage, page, request).await,

            Stage::FillHeaders => {
                let rows = self.header_rows(page).await?;
                let plan = HeaderRowPlan::pair(&rows, &request.headers);
                debug!(
                    containers = rows.len(),
                    rows = plan.rows().len(),
                    "header rows paired"
                );

                for row in plan.rows() {
                    page.fill(row.key, &row.header.name).await?;
                    page.fill(row.value, &row.header.value).await?;
                    if let Some(switch) = row.switch {
                        page.click(switch).await?;
                        page.dispatch(switch, DomEvent::Change).await?;
                    }
                    report.headers_filled += 1;
                }
                report.headers_skipped = plan.skipped();
                if plan.skipped() > 0 {
                    warn!(skipped = plan.skipped(), "headers without a row were left out");
                }
                Ok(())
            }
        }
    }

    /// Key, value and switch of every row container, each looked up inside
    /// its own container.
    async fn header_rows(&self, page: &dyn HostPage) -> Result<Vec<RowElements>, FlowError> {
        let anchors = &self.anchors;
        let containers = page.query_all(&anchors.header_row).await?;
        let mut rows = Vec::with_capacity(containers.len());
        for container in containers {
            rows.push(RowElements {
                key: page.first_within(container, &anchors.header_key).await?,
                value: page.first_within(container, &anchors.header_value).await?,
                switch: page.first_within(container, &anchors.header_switch).await?,
            });
        }
        Ok(rows)
    }

    /// Remove the row the form starts with. Optional: no delete button means
    /// there is nothing to clear.
    async fn clear_default_header(
        &self,
        stage: Stage,
        page: &dyn HostPage,
    ) -> Result<(), FlowError> {
        let deletes = page.query_all(&self.anchors.delete_header).await?;
        let Some(first) = deletes.first().copied() else {
            debug!("no default header row to clear");
            return Ok(());
        };

        let before = page.count(&self.anchors.header_key).await?;
        page.click(first).await?;
        match self
            .poll(page, &self.anchors.header_key, |keys| keys.len() < before)
            .await?
        {
            Poll::Ready(_) => Ok(()),
            Poll::Expired { waited_ms } => {
                debug!(stage = %stage, waited_ms, "default header row still present");
                Ok(())
            }
        }
    }

    async fn add_header_rows(
        &self,
        stage: Stage,
        page: &dyn HostPage,
        request: &HandoffRequest,
    ) -> Result<(), FlowError> {
        if request.headers.is_empty() {
            return Ok(());
        }
        let add = self.wait_for(stage, page, &self.anchors.add_header).await?;

        for index in 0..request.headers.len() {
            let before = page.count(&self.anchors.header_key).await?;
            page.click(add).await?;
            match self
                .poll(page, &self.anchors.header_key, |keys| keys.len() > before)
                .await?
            {
                Poll::Ready(_) => debug!(row = index + 1, "header row added"),
                Poll::Expired { waited_ms } => {
                    return Err(FlowError::GuardTimeout {
                        stage,
                        condition: format!("header row {}", index + 1),
                        waited_ms,
                    })
                }
            }
        }
        Ok(())
    }

    /// First element matching `anchor`, waiting for it to appear.
    async fn wait_for(
        &self,
        stage: Stage,
        page: &dyn HostPage,
        anchor: &Anchor,
    ) -> Result<ElementHandle, FlowError> {
        match self.poll(page, anchor, |found| !found.is_empty()).await? {
            Poll::Ready(found) => {
                found
                    .first()
                    .copied()
                    .ok_or_else(|| FlowError::ElementMissing {
                        stage,
                        anchor: anchor.to_string(),
                        waited_ms: 0,
                    })
            }
            Poll::Expired { waited_ms } => Err(FlowError::ElementMissing {
                stage,
                anchor: anchor.to_string(),
                waited_ms,
            }),
        }
    }

    async fn poll(
        &self,
        page: &dyn HostPage,
        anchor: &Anchor,
        accept: impl Fn(&[ElementHandle]) -> bool,
    ) -> Result<Poll, FlowError> {
        let started = Instant::now();
        let deadline = started + self.config.stage_timeout();
        loop {
            let found = page.query_all(anchor).await?;
            if accept(&found) {
                return Ok(Poll::Ready(found));
            }
            if Instant::now() >= deadline {
                let waited_ms = started.elapsed().as_millis() as u64;
                return Ok(Poll::Expired { waited_ms });
            }
            sleep(self.config.poll_interval()).await;
        }
    }
}
