use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

pub const FINANCIAL_SYSTEMS: [&str; 2] = ["Conta Azul", "Omie"];

/// What kind of account is being reviewed. Labels are the user-facing
/// Portuguese strings and double as the form/select values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccountKind {
    #[default]
    Banco,
    Caixa,
    Maquineta,
    CartaoPrePago,
    CartaoCredito,
}

impl AccountKind {
    pub const ALL: [AccountKind; 5] = [
        AccountKind::Banco,
        AccountKind::Caixa,
        AccountKind::Maquineta,
        AccountKind::CartaoPrePago,
        AccountKind::CartaoCredito,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AccountKind::Banco => "Banco",
            AccountKind::Caixa => "Caixa",
            AccountKind::Maquineta => "Maquineta",
            AccountKind::CartaoPrePago => "Cartão Pré-pago",
            AccountKind::CartaoCredito => "Cartão de Crédito",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.label() == s)
    }

    /// Cash boxes have a counted balance instead of a bank statement.
    pub fn is_cash(self) -> bool {
        self == AccountKind::Caixa
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Provision {
    #[default]
    Unset,
    Sim,
    Nao,
}

impl Provision {
    pub const ALL: [Provision; 3] = [Provision::Unset, Provision::Sim, Provision::Nao];

    pub fn label(self) -> &'static str {
        match self {
            Provision::Unset => "",
            Provision::Sim => "Sim",
            Provision::Nao => "Não",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.label() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DocumentStatus {
    #[default]
    Unset,
    Sim,
    Nao,
    Parcialmente,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 4] = [
        DocumentStatus::Unset,
        DocumentStatus::Sim,
        DocumentStatus::Nao,
        DocumentStatus::Parcialmente,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DocumentStatus::Unset => "",
            DocumentStatus::Sim => "Sim",
            DocumentStatus::Nao => "Não",
            DocumentStatus::Parcialmente => "Parcialmente",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.label() == s)
    }
}

/// One account under review inside a sector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountEntry {
    pub kind: AccountKind,
    pub name: String,
    /// Extrato bancário. Only meaningful for non-cash kinds.
    pub statement: String,
    /// Conciliações pendentes.
    pub reconciliations: String,
    /// Saldo atual. Only meaningful for cash boxes.
    pub balance: String,
    pub provision: Provision,
    pub documents: DocumentStatus,
    pub observations: String,
}

impl AccountEntry {
    /// Statement and balance are mutually exclusive per kind: a cash box has
    /// no statement, everything else has no counted balance. Stale values
    /// left over from a kind switch are dropped here.
    pub fn normalize(&mut self) {
        if self.kind.is_cash() {
            self.statement.clear();
        } else {
            self.balance.clear();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorForm {
    pub name: String,
    pub responsible: String,
    pub accounts: Vec<AccountEntry>,
}

impl SectorForm {
    pub fn new(name: String) -> Self {
        Self {
            name,
            responsible: String::new(),
            accounts: Vec::new(),
        }
    }
}

/// The per-session draft of the whole form. Never persisted; flattened into
/// history rows and PDF blocks on generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewForm {
    pub review_date: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub system: String,
    pub sectors: Vec<SectorForm>,
}

impl Default for ReviewForm {
    fn default() -> Self {
        let today = Local::now().date_naive();
        Self {
            review_date: today,
            period_start: today,
            period_end: today,
            system: FINANCIAL_SYSTEMS[0].to_string(),
            sectors: Vec::new(),
        }
    }
}

impl ReviewForm {
    /// Replace the sector selection, keeping already-filled sector forms for
    /// names that stay selected and creating empty ones for new names, in
    /// selection order.
    pub fn select_sectors(&mut self, names: &[String]) {
        let mut old = std::mem::take(&mut self.sectors);
        for name in names {
            match old.iter().position(|s| &s.name == name) {
                Some(pos) => self.sectors.push(old.swap_remove(pos)),
                None => self.sectors.push(SectorForm::new(name.clone())),
            }
        }
    }

    pub fn date_label(&self) -> String {
        self.review_date.format("%d/%m/%Y").to_string()
    }

    pub fn period_label(&self) -> String {
        format!(
            "{} a {}",
            self.period_start.format("%d/%m/%Y"),
            self.period_end.format("%d/%m/%Y")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels_roundtrip() {
        for kind in AccountKind::ALL {
            assert_eq!(AccountKind::from_label(kind.label()), Some(kind));
        }
        assert_eq!(AccountKind::from_label("Poupança"), None);
    }

    #[test]
    fn test_normalize_clears_statement_for_cash() {
        let mut entry = AccountEntry {
            kind: AccountKind::Caixa,
            statement: "extrato antigo".to_string(),
            balance: "R$ 150,00".to_string(),
            ..Default::default()
        };
        entry.normalize();
        assert!(entry.statement.is_empty());
        assert_eq!(entry.balance, "R$ 150,00");
    }

    #[test]
    fn test_normalize_clears_balance_for_bank() {
        let mut entry = AccountEntry {
            kind: AccountKind::Banco,
            statement: "ok".to_string(),
            balance: "R$ 150,00".to_string(),
            ..Default::default()
        };
        entry.normalize();
        assert_eq!(entry.statement, "ok");
        assert!(entry.balance.is_empty());
    }

    #[test]
    fn test_select_sectors_keeps_filled_forms() {
        let mut form = ReviewForm::default();
        form.select_sectors(&["A".to_string(), "B".to_string()]);
        form.sectors[1].responsible = "Maria".to_string();
        form.sectors[1].accounts.push(AccountEntry::default());

        form.select_sectors(&["B".to_string(), "C".to_string()]);
        assert_eq!(form.sectors.len(), 2);
        assert_eq!(form.sectors[0].name, "B");
        assert_eq!(form.sectors[0].responsible, "Maria");
        assert_eq!(form.sectors[0].accounts.len(), 1);
        assert_eq!(form.sectors[1].name, "C");
        assert!(form.sectors[1].responsible.is_empty());
    }

    #[test]
    fn test_period_label() {
        let mut form = ReviewForm::default();
        form.period_start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        form.period_end = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert_eq!(form.period_label(), "01/01/2025 a 31/01/2025");
    }
}
