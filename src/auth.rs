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

//! Accounts: password hashing, registration and login.

use crate::billing;
use crate::db::{is_unique_violation, PgPool};
use crate::errors::VectraError;
use crate::ledger::{self, CoinReason, REFERRAL_SIGNUP_BONUS};
use crate::models::{
	activity_log::{self, log_activity, log_system},
	plan::{self, BillingPeriod},
	referral,
	user::{self, User},
};
use sqlx::types::chrono::Utc;
use sqlx::PgConnection;

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const PASSWORD_RULES: &str = "Password must be at least 8 characters long and include an uppercase letter, a lowercase letter, a number, and a special character";

pub fn hash_password(password: &str) -> Result<String, VectraError> {
	Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
	bcrypt::verify(password, hash).unwrap_or(false)
}

/// Cheap syntactic check: `local@domain.tld`, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
	if email.len() > 255 || email.chars().any(char::is_whitespace) {
		return false;
	}

	let mut parts = email.splitn(2, '@');
	let (local, domain) = match (parts.next(), parts.next()) {
		(Some(local), Some(domain)) => (local, domain),
		_ => return false,
	};

	!local.is_empty()
		&& !domain.contains('@')
		&& domain.contains('.')
		&& !domain.starts_with('.')
		&& !domain.ends_with('.')
		&& !domain.contains("..")
}

pub fn is_strong_password(password: &str) -> bool {
	password.chars().count() >= MIN_PASSWORD_LENGTH
		&& password.chars().any(|c| c.is_ascii_uppercase())
		&& password.chars().any(|c| c.is_ascii_lowercase())
		&& password.chars().any(|c| c.is_ascii_digit())
		&& password.chars().any(|c| !c.is_alphanumeric())
}

/// Registration input, after trimming.
#[derive(Debug)]
pub struct Registration<'a> {
	pub full_name: &'a str,
	pub email: &'a str,
	pub password: &'a str,
	pub confirm_password: &'a str,
}

impl Registration<'_> {
	pub fn validate(&self) -> Result<(), VectraError> {
		if self.full_name.trim().is_empty()
			|| self.email.trim().is_empty()
			|| self.password.is_empty()
			|| self.confirm_password.is_empty()
		{
			return Err(VectraError::Validation("All fields are required".into()));
		}
		if !is_valid_email(self.email.trim()) {
			return Err(VectraError::Validation("Invalid email format".into()));
		}
		if !is_strong_password(self.password) {
			return Err(VectraError::Validation(PASSWORD_RULES.into()));
		}
		if self.password != self.confirm_password {
			return Err(VectraError::Validation("Passwords do not match".into()));
		}

		Ok(())
	}
}

/// Create an account in one transaction: the user, a year of the free plan
/// with its coins, the user's own referral code, and the referrer's bonus
/// when `referral_code` belongs to someone else.
pub async fn register_user(
	pool: &PgPool,
	registration: &Registration<'_>,
	referral_code: Option<&str>,
	ip_address: Option<&str>,
) -> Result<User, VectraError> {
	registration.validate()?;
	let email = registration.email.trim();
	let taken = || VectraError::Conflict("Email already registered".into());

	if user::get_user_by_email(pool, email).await?.is_some() {
		return Err(taken());
	}
	let password_hash = hash_password(registration.password)?;

	let mut tx = pool.begin().await?;
	let mut user =
		match user::create_user(&mut tx, registration.full_name.trim(), email, &password_hash).await {
			Ok(user) => user,
			Err(e) if is_unique_violation(&e) => return Err(taken()),
			Err(e) => return Err(e.into()),
		};

	match plan::get_free_plan(&mut *tx).await? {
		Some(free_plan) => {
			let end_date = billing::expiration_for(BillingPeriod::Yearly, Utc::now());
			billing::activate_plan(&mut tx, user.id, &free_plan, end_date, false, None).await?;
			user.coins =
				ledger::top_up(&mut tx, user.id, free_plan.coin_limit, CoinReason::PlanGrant).await?;
		}
		None => log::warn!(
			target: "vectrahub",
			"No free plan configured, [user_id={}] starts without a subscription",
			user.id
		),
	}

	referral::create_referral_link(&mut tx, user.id).await?;
	if let Some(code) = referral_code.and_then(referral::normalize_referral_code) {
		reward_referrer(&mut tx, &code, user.id).await?;
	}

	log_activity(
		&mut *tx,
		activity_log::USER_REGISTERED,
		&format!("New user registered: {}", user.email),
		Some(user.id),
	)
	.await?;
	log_system(
		&mut *tx,
		activity_log::USER_REGISTERED,
		&format!("User registered: {}", user.email),
		Some(user.id),
		ip_address,
	)
	.await?;
	tx.commit().await?;

	log::info!(target: "vectrahub", "Registered [user_id={}]", user.id);

	Ok(user)
}

/// Pay the signup bonus to the owner of `code`, at most once per referred
/// user. Unknown codes and self-referrals are ignored.
async fn reward_referrer(conn: &mut PgConnection, code: &str, referred_user_id: i32) -> Result<(), VectraError> {
	let referrer = match referral::get_referrer_by_code(&mut *conn, code).await? {
		Some(referrer) if referrer != referred_user_id => referrer,
		_ => {
			log::info!(target: "vectrahub", "Ignoring unknown referral [code={}]", code);
			return Ok(());
		}
	};

	if !referral::record_signup(&mut *conn, referrer, referred_user_id).await? {
		return Ok(());
	}
	ledger::credit(&mut *conn, referrer, REFERRAL_SIGNUP_BONUS, CoinReason::ReferralBonus).await?;
	log_activity(
		&mut *conn,
		activity_log::REFERRAL_SIGNUP,
		&format!(
			"User {} signed up through the referral link of user {}",
			referred_user_id, referrer
		),
		Some(referrer),
	)
	.await?;

	Ok(())
}

/// Check an email and password pair. Unknown emails and wrong passwords get
/// the same answer.
pub async fn authenticate_user(pool: &PgPool, email: &str, password: &str) -> Result<User, VectraError> {
	let invalid = || VectraError::Unauthorized("Invalid credentials".into());

	if email.trim().is_empty() || password.is_empty() {
		return Err(VectraError::Validation("Email and password are required".into()));
	}
	let user = user::get_user_by_email(pool, email.trim()).await?.ok_or_else(invalid)?;
	if !verify_password(password, &user.password_hash) {
		return Err(invalid());
	}

	Ok(user)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn registration<'a>(email: &'a str, password: &'a str, confirm: &'a str) -> Registration<'a> {
		Registration {
			full_name: "Ada Lovelace",
			email,
			password,
			confirm_password: confirm,
		}
	}

	#[test]
	fn test_email_format() {
		assert!(is_valid_email("ada@example.com"));
		assert!(is_valid_email("ada.lovelace+vh@mail.example.co.uk"));
		assert!(!is_valid_email("ada@"));
		assert!(!is_valid_email("@example.com"));
		assert!(!is_valid_email("ada@example"));
		assert!(!is_valid_email("ada@@example.com"));
		assert!(!is_valid_email("ada @example.com"));
		assert!(!is_valid_email("ada@example..com"));
	}

	#[test]
	fn test_password_strength() {
		assert!(is_strong_password("Secr3t!pass"));
		assert!(!is_strong_password("Sh0rt!"));
		assert!(!is_strong_password("alllowercase1!"));
		assert!(!is_strong_password("ALLUPPERCASE1!"));
		assert!(!is_strong_password("NoDigits!!"));
		assert!(!is_strong_password("NoSpecial123"));
	}

	#[test]
	fn test_registration_validation() {
		assert!(registration("ada@example.com", "Secr3t!pass", "Secr3t!pass")
			.validate()
			.is_ok());

		let err = registration("ada@example.com", "Secr3t!pass", "Secr3t!pasS")
			.validate()
			.unwrap_err();
		assert_eq!(err.to_string(), "Passwords do not match");

		let err = registration("", "Secr3t!pass", "Secr3t!pass").validate().unwrap_err();
		assert_eq!(err.to_string(), "All fields are required");
	}

	#[test]
	fn test_hash_and_verify() {
		let hash = bcrypt::hash("Secr3t!pass", 4).unwrap();
		assert!(verify_password("Secr3t!pass", &hash));
		assert!(!verify_password("wrong", &hash));
		assert!(!verify_password("Secr3t!pass", "not-a-hash"));
	}
}
