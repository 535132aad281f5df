//! Cluster command handlers.

use tabled::Tabled;

use gravity_core::operator::{Accounts, Sites};
use gravity_core::{Operator, Site};

use crate::cli::{ClustersArgs, ClustersCommand, GlobalOpts};
use crate::config::Target;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ClusterRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Application")]
    app: String,
    #[tabled(rename = "Nodes")]
    nodes: usize,
    #[tabled(rename = "Created")]
    created: String,
}

impl ClusterRow {
    fn new(site: &Site, color: bool) -> Self {
        Self {
            name: site.domain.clone(),
            account: site.account_id.clone(),
            state: output::paint_state(&site.state.to_string(), color),
            app: site.app.package.to_string(),
            nodes: site.cluster_state.servers.len(),
            created: util::format_time(&site.created),
        }
    }
}

fn detail(site: &Site) -> String {
    let mut fields = vec![
        ("Name", site.domain.clone()),
        ("Account", site.account_id.clone()),
        ("State", site.state.to_string()),
        ("Application", site.app.package.to_string()),
        ("Provisioner", site.provisioner.clone()),
        ("Created", util::format_time(&site.created)),
    ];
    if !site.created_by.is_empty() {
        fields.push(("Created by", site.created_by.clone()));
    }
    if !site.reason.is_empty() {
        fields.push(("Reason", site.reason.clone()));
    }
    if !site.labels.is_empty() {
        let labels = site
            .labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        fields.push(("Labels", labels));
    }
    for server in &site.cluster_state.servers {
        fields.push((
            "Node",
            format!(
                "{} ({}, {}, {})",
                server.hostname, server.advertise_ip, server.role, server.cluster_role
            ),
        ));
    }
    output::render_fields(&fields)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    operator: &dyn Operator,
    target: &Target,
    args: ClustersArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ClustersCommand::List => {
            let sites = match target.account {
                Some(ref account) => operator.get_sites(account).await?,
                None => {
                    let mut all = Vec::new();
                    for account in operator.get_accounts().await? {
                        all.extend(operator.get_sites(&account.id).await?);
                    }
                    all
                }
            };
            let color = output::should_color(&global.color);
            let out = output::render_list(
                &global.output,
                &sites,
                |s| ClusterRow::new(s, color),
                |s| s.domain.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ClustersCommand::Show { name } => {
            let name = util::cluster_name(target, name)?;
            let site = util::resolve_site(operator, target, &name).await?;
            let out = output::render_single(&global.output, &site, detail, |s| s.domain.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
