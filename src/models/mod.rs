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

pub mod activity_log;
pub mod checkout_order;
pub mod coupon;
pub mod image_job;
pub mod payment;
pub mod plan;
pub mod referral;
pub mod settings;
pub mod subscription;
pub mod user;

/// Convert integer cents into a dollar amount for JSON responses.
pub fn cents_to_dollars(cents: i64) -> f64 {
	cents as f64 / 100.0
}

/// Page/limit pair shared by every paginated listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
	pub page: i64,
	pub limit: i64,
}

impl Pagination {
	pub const MAX_LIMIT: i64 = 100;

	/// Clamp user-provided values: pages start at 1, the limit stays in
	/// `1..=MAX_LIMIT`.
	pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
		Pagination {
			page: page.unwrap_or(1).max(1),
			limit: limit.unwrap_or(default_limit).clamp(1, Self::MAX_LIMIT),
		}
	}

	pub fn offset(&self) -> i64 {
		(self.page - 1) * self.limit
	}

	pub fn total_pages(&self, total: i64) -> i64 {
		(total + self.limit - 1) / self.limit
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_pagination_clamps_input() {
		let p = Pagination::new(Some(0), Some(1000), 10);
		assert_eq!(p, Pagination { page: 1, limit: 100 });
		assert_eq!(p.offset(), 0);

		let p = Pagination::new(Some(3), None, 10);
		assert_eq!(p.offset(), 20);
		assert_eq!(Pagination::new(None, Some(-5), 10).limit, 1);
	}

	#[test]
	fn test_total_pages() {
		let p = Pagination::new(None, Some(10), 10);
		assert_eq!(p.total_pages(0), 0);
		assert_eq!(p.total_pages(10), 1);
		assert_eq!(p.total_pages(11), 2);
	}

	#[test]
	fn test_cents_to_dollars() {
		assert_eq!(cents_to_dollars(500), 5.0);
		assert_eq!(cents_to_dollars(999), 9.99);
	}
}
