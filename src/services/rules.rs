use tracing::info;
use uuid::Uuid;

use crate::{database::Database, error::AppResult, models::SeatSelectionRules};

pub const DEFAULT_RULES_NAME: &str = "Default";
const DEFAULT_RULES_DESCRIPTION: &str =
    "Start from the furthest row, center the group, overflow to closer rows";

const RULES_COLUMNS: &str = "id, name, description, start_from_furthest_row, start_from_middle_col, \
                             overflow_to_closer_row, created_at, updated_at";

#[derive(Clone)]
pub struct RulesService {
    db: Database,
}

impl RulesService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Заводит правило по умолчанию, если его еще нет.
    pub async fn initialize_default_rules(&self) -> AppResult<()> {
        let inserted = sqlx::query(
            "INSERT INTO seat_selection_rules
                 (id, name, description, start_from_furthest_row, start_from_middle_col, overflow_to_closer_row)
             VALUES ($1, $2, $3, TRUE, TRUE, TRUE)
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(DEFAULT_RULES_NAME)
        .bind(DEFAULT_RULES_DESCRIPTION)
        .execute(&self.db.pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            info!("Seeded default seat selection rules");
        }
        Ok(())
    }

    pub async fn find_all(&self) -> AppResult<Vec<SeatSelectionRules>> {
        let rules = sqlx::query_as::<_, SeatSelectionRules>(&format!(
            "SELECT {} FROM seat_selection_rules ORDER BY name",
            RULES_COLUMNS
        ))
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rules)
    }
}
