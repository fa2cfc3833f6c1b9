//! Trigger Synthesizer (C6): emulates FK enforcement with BEFORE triggers.

use crate::schema::{ForeignKey, Trigger, TriggerEvent, TriggerTiming};

fn trigger_name(prefix: &str, fk: &ForeignKey) -> String {
    format!(
        "{prefix}_{}_{}_{}_{}",
        fk.table_name, fk.column_name, fk.foreign_table_name, fk.foreign_column_name
    )
}

fn existence_check(fk: &ForeignKey, referenced_value: &str) -> String {
    format!(
        "(SELECT 1 FROM [{}] WHERE [{}] = {})",
        fk.foreign_table_name, fk.foreign_column_name, referenced_value
    )
}

fn insert_or_update_body(fk: &ForeignKey, new_value: &str, action: &str) -> String {
    let check = existence_check(fk, new_value);
    let condition = if fk.is_nullable {
        format!("{new_value} IS NOT NULL AND NOT EXISTS {check}")
    } else {
        format!("NOT EXISTS {check}")
    };
    format!(
        "SELECT RAISE(ROLLBACK, 'foreign key violation on {action}: {}.{} does not reference an existing {}.{}') WHERE {condition};",
        fk.table_name, fk.column_name, fk.foreign_table_name, fk.foreign_column_name
    )
}

/// Synthesizes the insert/update/delete triggers for one foreign key
/// (spec.md §4.6).
pub fn synthesize(fk: &ForeignKey) -> Vec<Trigger> {
    let insert = Trigger {
        name: trigger_name("fki", fk),
        timing: TriggerTiming::Before,
        event: TriggerEvent::Insert,
        table: fk.table_name.clone(),
        body: insert_or_update_body(fk, &format!("NEW.{}", fk.column_name), "insert"),
    };

    let update = Trigger {
        name: trigger_name("fku", fk),
        timing: TriggerTiming::Before,
        event: TriggerEvent::Update,
        table: fk.table_name.clone(),
        body: insert_or_update_body(fk, &format!("NEW.{}", fk.column_name), "update"),
    };

    let delete_body = if fk.cascade_on_delete {
        format!(
            "DELETE FROM [{}] WHERE {} = OLD.{};",
            fk.table_name, fk.column_name, fk.foreign_column_name
        )
    } else {
        format!(
            "SELECT RAISE(ROLLBACK, 'foreign key violation on delete: {}.{} is still referenced by {}.{}') WHERE (SELECT 1 FROM [{}] WHERE [{}] = OLD.{});",
            fk.foreign_table_name,
            fk.foreign_column_name,
            fk.table_name,
            fk.column_name,
            fk.table_name,
            fk.column_name,
            fk.foreign_column_name,
        )
    };
    let delete = Trigger {
        name: trigger_name("fkd", fk),
        timing: TriggerTiming::Before,
        event: TriggerEvent::Delete,
        table: fk.foreign_table_name.clone(),
        body: delete_body,
    };

    vec![insert, update, delete]
}
