//! Checks for records referenced from another record's payload.
//!
//! A referenced record must exist (400 otherwise) and belong to someone in the
//! caller's scope (403 otherwise).

use db::models::{company::Company, customer::Customer, deal::Deal};
use services::services::authorization::Actor;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Links {
    pub customer_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
}

impl Links {
    pub(crate) fn company(company_id: Option<Uuid>) -> Self {
        Self {
            company_id,
            ..Self::default()
        }
    }

    pub(crate) async fn ensure_linkable(self, pool: &SqlitePool, actor: &Actor) -> Result<(), ApiError> {
        if let Some(id) = self.customer_id {
            let customer = Customer::find_by_id(pool, id)
                .await?
                .ok_or_else(|| missing("customer", id))?;
            actor.ensure_can_modify(customer.owner_id)?;
        }
        if let Some(id) = self.company_id {
            let company = Company::find_by_id(pool, id)
                .await?
                .ok_or_else(|| missing("company", id))?;
            actor.ensure_can_modify(company.owner_id)?;
        }
        if let Some(id) = self.deal_id {
            let deal = Deal::find_by_id(pool, id)
                .await?
                .ok_or_else(|| missing("deal", id))?;
            actor.ensure_can_modify(deal.owner_id)?;
        }
        Ok(())
    }
}

fn missing(kind: &str, id: Uuid) -> ApiError {
    ApiError::BadRequest(format!("{kind} {id} does not exist"))
}
