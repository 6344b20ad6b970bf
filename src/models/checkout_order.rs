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

//! Local record of a Stripe Checkout Session we created. When a webhook
//! arrives, this row, not the session metadata, says who bought what.

use sqlx::{Executor, PgConnection, Postgres};

#[derive(Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
pub enum OrderStatus {
	Pending,
	Completed,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct CheckoutOrder {
	pub id: i32,
	pub stripe_session_id: String,
	pub user_id: i32,
	pub plan_id: i32,
	pub amount_cents: i64,
	pub status: OrderStatus,
}

pub async fn insert_order<'e, E>(
	executor: E,
	stripe_session_id: &str,
	user_id: i32,
	plan_id: i32,
	amount_cents: i64,
) -> Result<(), sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		r#"
		INSERT INTO checkout_orders (stripe_session_id, user_id, plan_id, amount_cents)
		VALUES ($1, $2, $3, $4)
		"#,
	)
	.bind(stripe_session_id)
	.bind(user_id)
	.bind(plan_id)
	.bind(amount_cents)
	.execute(executor)
	.await?;

	Ok(())
}

/// Fetch and lock the order of a checkout session.
pub async fn get_order_for_update(
	conn: &mut PgConnection,
	stripe_session_id: &str,
) -> Result<Option<CheckoutOrder>, sqlx::Error> {
	sqlx::query_as::<_, CheckoutOrder>(
		r#"
		SELECT id, stripe_session_id, user_id, plan_id, amount_cents, status
		FROM checkout_orders
		WHERE stripe_session_id = $1
		FOR UPDATE
		"#,
	)
	.bind(stripe_session_id)
	.fetch_optional(conn)
	.await
}

pub async fn complete_order(conn: &mut PgConnection, id: i32) -> Result<(), sqlx::Error> {
	sqlx::query("UPDATE checkout_orders SET status = 'completed' WHERE id = $1")
		.bind(id)
		.execute(conn)
		.await?;

	Ok(())
}
