//! Row visibility filters shared by the list queries.

use sqlx::{QueryBuilder, Sqlite};
use utils::date_range::DateRange;
use uuid::Uuid;

/// Owners whose records a caller may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Users(Vec<Uuid>),
}

impl Scope {
    pub fn single(user_id: Uuid) -> Self {
        Scope::Users(vec![user_id])
    }

    pub fn includes(&self, owner_id: Uuid) -> bool {
        match self {
            Scope::All => true,
            Scope::Users(ids) => ids.contains(&owner_id),
        }
    }

    /// Append ` AND <column> IN (...)` to a query that already has a WHERE clause.
    pub fn push_filter(&self, qb: &mut QueryBuilder<'_, Sqlite>, column: &str) {
        match self {
            Scope::All => {}
            Scope::Users(ids) if ids.is_empty() => {
                qb.push(" AND 0");
            }
            Scope::Users(ids) => {
                qb.push(" AND ").push(column).push(" IN (");
                let mut separated = qb.separated(", ");
                for id in ids {
                    separated.push_bind(*id);
                }
                separated.push_unseparated(")");
            }
        }
    }
}

/// Append a half-open range filter on `column` when a range is given.
pub fn push_range(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, range: Option<&DateRange>) {
    if let Some(range) = range {
        qb.push(" AND ")
            .push(column)
            .push(" >= ")
            .push_bind(range.start)
            .push(" AND ")
            .push(column)
            .push(" < ")
            .push_bind(range.end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_membership() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(Scope::All.includes(other));
        assert!(Scope::single(me).includes(me));
        assert!(!Scope::single(me).includes(other));
        assert!(!Scope::Users(vec![]).includes(me));
    }

    #[test]
    fn filter_sql_shape() {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM deals WHERE 1 = 1");
        Scope::Users(vec![Uuid::new_v4(), Uuid::new_v4()]).push_filter(&mut qb, "owner_id");
        assert_eq!(
            qb.sql(),
            "SELECT * FROM deals WHERE 1 = 1 AND owner_id IN (?, ?)"
        );

        let mut empty = QueryBuilder::<Sqlite>::new("SELECT * FROM deals WHERE 1 = 1");
        Scope::Users(vec![]).push_filter(&mut empty, "owner_id");
        assert_eq!(empty.sql(), "SELECT * FROM deals WHERE 1 = 1 AND 0");
    }
}
