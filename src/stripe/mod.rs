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

//! The slice of Stripe we talk to: Checkout Session creation and signed
//! webhook events.

pub mod client;
pub mod event;
pub mod signature;

pub use client::{CheckoutSessionCreated, StripeClient};
pub use event::{CheckoutSession, Invoice, SubscriptionObject, WebhookEvent};
pub use signature::{verify_signature, SignatureError, STRIPE_SIGNATURE_HEADER};
