//! Swap proposal persistence. Postgres is authoritative for this table.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use shiftwise_core::{EmployeeId, ShiftId, SwapId, Timestamp};
use shiftwise_state::{DecisionState, SwapParts, SwapProposal};

use super::{corrupt, unknown_value, Conditional};

const COLUMNS: &str = "id, requester_id, partner_id, requester_shift_id, partner_shift_id, \
                       reason, status, decided_by, decided_at, created_at";

pub async fn insert(pool: &PgPool, proposal: &SwapProposal) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO swap_proposals (id, requester_id, partner_id, requester_shift_id,
             partner_shift_id, reason, status, decided_by, decided_at, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(proposal.id().0)
    .bind(proposal.requester().0)
    .bind(proposal.partner().0)
    .bind(proposal.requester_shift().0)
    .bind(proposal.partner_shift().0)
    .bind(proposal.reason())
    .bind(proposal.state().as_str())
    .bind(proposal.ruling().decided_by().map(|e| e.0))
    .bind(proposal.ruling().decided_at().map(|t| *t.as_datetime()))
    .bind(*proposal.created_at().as_datetime())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get(pool: &PgPool, id: SwapId) -> Result<Option<SwapProposal>, sqlx::Error> {
    let row = sqlx::query_as::<_, SwapRow>(&format!(
        "SELECT {COLUMNS} FROM swap_proposals WHERE id = $1"
    ))
    .bind(id.0)
    .fetch_optional(pool)
    .await?;

    row.map(SwapRow::into_record).transpose()
}

/// Proposals newest first, optionally only those involving `party`.
pub async fn list(
    pool: &PgPool,
    party: Option<EmployeeId>,
) -> Result<Vec<SwapProposal>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SwapRow>(&format!(
        "SELECT {COLUMNS} FROM swap_proposals
         WHERE $1::uuid IS NULL OR requester_id = $1 OR partner_id = $1
         ORDER BY created_at DESC, id"
    ))
    .bind(party.map(|e| e.0))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(SwapRow::into_record).collect()
}

/// Seal a pending proposal, unless `approver` is one of its parties.
///
/// When refused, returns the row as it stands so the caller can tell a
/// party-approver apart from an already-decided proposal.
pub async fn decide(
    conn: &mut PgConnection,
    id: SwapId,
    outcome: DecisionState,
    approver: EmployeeId,
) -> Result<Conditional<SwapProposal, SwapProposal>, sqlx::Error> {
    let row = sqlx::query_as::<_, SwapRow>(&format!(
        "UPDATE swap_proposals SET status = $2, decided_by = $3, decided_at = $4
         WHERE id = $1 AND status = 'pending'
           AND requester_id <> $3 AND partner_id <> $3
         RETURNING {COLUMNS}"
    ))
    .bind(id.0)
    .bind(outcome.as_str())
    .bind(approver.0)
    .bind(*Timestamp::now().as_datetime())
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(row) = row {
        return Ok(Conditional::Applied(row.into_record()?));
    }
    let current = sqlx::query_as::<_, SwapRow>(&format!(
        "SELECT {COLUMNS} FROM swap_proposals WHERE id = $1"
    ))
    .bind(id.0)
    .fetch_optional(&mut *conn)
    .await?;
    match current {
        None => Ok(Conditional::Missing),
        Some(row) => Ok(Conditional::Refused(row.into_record()?)),
    }
}

#[derive(sqlx::FromRow)]
struct SwapRow {
    id: Uuid,
    requester_id: Uuid,
    partner_id: Uuid,
    requester_shift_id: Uuid,
    partner_shift_id: Uuid,
    reason: String,
    status: String,
    decided_by: Option<Uuid>,
    decided_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl SwapRow {
    fn into_record(self) -> Result<SwapProposal, sqlx::Error> {
        let state = DecisionState::parse(&self.status)
            .ok_or_else(|| unknown_value("swap_proposals.status", &self.status))?;
        SwapProposal::from_parts(SwapParts {
            id: SwapId(self.id),
            requester: EmployeeId(self.requester_id),
            partner: EmployeeId(self.partner_id),
            requester_shift: ShiftId(self.requester_shift_id),
            partner_shift: ShiftId(self.partner_shift_id),
            reason: self.reason,
            state,
            decided_by: self.decided_by.map(EmployeeId),
            decided_at: self.decided_at.map(Timestamp::from_utc),
            created_at: Timestamp::from_utc(self.created_at),
        })
        .map_err(corrupt)
    }
}
