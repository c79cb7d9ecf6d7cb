use crate::model::ReviewForm;

/// Header row of the history worksheet. One flattened row per account is
/// appended under these columns, in this order.
pub const HISTORY_HEADER: [&str; 14] = [
    "Data",
    "Acompanhador(a)",
    "Setor",
    "Sistema financeiro",
    "Responsável",
    "Período",
    "Tipo de conta",
    "Nome da conta",
    "Extrato bancário",
    "Conciliações pendentes",
    "Saldo atual",
    "Provisões",
    "Documentos",
    "Observações",
];

/// One PDF card: a bold title plus the filled-in field lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportBlock {
    pub title: String,
    pub lines: Vec<String>,
}

/// The two sinks of a submission: history rows (always one per account) and
/// PDF cards (only accounts with at least one filled-in field).
#[derive(Debug, Clone)]
pub struct Export {
    pub rows: Vec<Vec<String>>,
    pub blocks: Vec<ReportBlock>,
}

/// `pedrina_freitas` -> `Pedrina Freitas`.
pub fn reviewer_display_name(user: &str) -> String {
    user.split(['_', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Flatten the draft into history rows and PDF blocks, in sector-selection
/// then account order. Mutually exclusive fields are nulled per account kind
/// before anything is emitted.
pub fn build_export(form: &ReviewForm, reviewer: &str) -> Export {
    let reviewer_name = reviewer_display_name(reviewer);
    let date = form.date_label();
    let period = form.period_label();

    let mut rows = Vec::new();
    let mut blocks = Vec::new();

    for sector in &form.sectors {
        for entry in &sector.accounts {
            let mut entry = entry.clone();
            entry.normalize();

            rows.push(vec![
                date.clone(),
                reviewer_name.clone(),
                sector.name.clone(),
                form.system.clone(),
                sector.responsible.clone(),
                period.clone(),
                entry.kind.label().to_string(),
                entry.name.clone(),
                entry.statement.clone(),
                entry.reconciliations.clone(),
                entry.balance.clone(),
                entry.provision.label().to_string(),
                entry.documents.label().to_string(),
                entry.observations.clone(),
            ]);

            let mut lines = Vec::new();
            let mut push = |label: &str, value: &str| {
                if !value.is_empty() {
                    lines.push(format!("{label}: {value}"));
                }
            };
            push("Responsável", &sector.responsible);
            push("Tipo de conta", entry.kind.label());
            push("Nome da conta", &entry.name);
            push("Extrato bancário", &entry.statement);
            push("Conciliações pendentes", &entry.reconciliations);
            push("Saldo atual", &entry.balance);
            push("Provisões", entry.provision.label());
            push("Documentos", entry.documents.label());
            push("Observações", &entry.observations);

            if !lines.is_empty() {
                let title = if entry.name.is_empty() {
                    sector.name.clone()
                } else {
                    format!("{} - {}", sector.name, entry.name)
                };
                blocks.push(ReportBlock { title, lines });
            }
        }
    }

    Export { rows, blocks }
}

/// Download name for the generated PDF. A single-sector review names the
/// file after the sector; anything else falls back to the generic name.
pub fn download_filename(form: &ReviewForm) -> String {
    match form.sectors.as_slice() {
        [only] => {
            let safe: String = only
                .name
                .chars()
                .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
                .collect();
            let safe = safe.trim();
            if safe.is_empty() {
                "Acompanhamento.pdf".to_string()
            } else {
                format!("Acompanhamento - {safe}.pdf")
            }
        }
        _ => "Acompanhamento.pdf".to_string(),
    }
}
