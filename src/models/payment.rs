// VectraHub - Image Vectorization
// Copyright (C) 2024 VectraHub

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use serde::Serialize;
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::{Executor, PgConnection, Postgres};

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Payment {
	pub id: i32,
	pub user_id: i32,
	pub plan_id: Option<i32>,
	pub plan_name: Option<String>,
	pub amount_cents: i64,
	pub payment_method: String,
	pub transaction_id: String,
	pub paid_at: DateTime<Utc>,
}

/// Whether a payment with this transaction id has already been recorded.
pub async fn payment_exists<'e, E>(executor: E, transaction_id: &str) -> Result<bool, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM payments WHERE transaction_id = $1)")
		.bind(transaction_id)
		.fetch_one(executor)
		.await
}

pub async fn insert_payment(
	conn: &mut PgConnection,
	user_id: i32,
	plan_id: i32,
	amount_cents: i64,
	payment_method: &str,
	transaction_id: &str,
) -> Result<i32, sqlx::Error> {
	sqlx::query_scalar(
		r#"
		INSERT INTO payments (user_id, plan_id, amount_cents, payment_method, transaction_id)
		VALUES ($1, $2, $3, $4, $5)
		RETURNING id
		"#,
	)
	.bind(user_id)
	.bind(plan_id)
	.bind(amount_cents)
	.bind(payment_method)
	.bind(transaction_id)
	.fetch_one(conn)
	.await
}

/// Payment history of a user, newest first.
pub async fn list_user_payments<'e, E>(executor: E, user_id: i32) -> Result<Vec<Payment>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, Payment>(
		r#"
		SELECT pay.id, pay.user_id, pay.plan_id, p.name AS plan_name, pay.amount_cents,
			pay.payment_method, pay.transaction_id, pay.paid_at
		FROM payments pay
		LEFT JOIN subscription_plans p ON p.id = pay.plan_id
		WHERE pay.user_id = $1
		ORDER BY pay.paid_at DESC
		"#,
	)
	.bind(user_id)
	.fetch_all(executor)
	.await
}

/// Revenue collected since the start of the current month, in cents.
pub async fn revenue_this_month<'e, E>(executor: E) -> Result<i64, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_scalar(
		r#"
		SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM payments
		WHERE paid_at >= date_trunc('month', NOW())
		"#,
	)
	.fetch_one(executor)
	.await
}
