//! In-memory [`SessionStore`] for tests and demos.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// self
use crate::{
	_prelude::*,
	auth::Principal,
	session::{AuthenticationTicket, SessionError, SessionFuture, SessionStore},
};

type TicketKey = (String, String);

/// Keeps one ticket per (subject, scheme) pair.
#[derive(Clone, Debug, Default)]
pub struct MemorySessionStore {
	tickets: Arc<RwLock<HashMap<TicketKey, AuthenticationTicket>>>,
	sliding_expiration: bool,
	authentications: Arc<AtomicUsize>,
	sign_ins: Arc<AtomicUsize>,
}
impl MemorySessionStore {
	/// Enables sliding expiration for every scheme.
	pub fn with_sliding_expiration(mut self, enabled: bool) -> Self {
		self.sliding_expiration = enabled;

		self
	}

	/// Seeds a ticket for its principal's subject and scheme.
	pub fn insert(&self, ticket: AuthenticationTicket) -> Result<(), SessionError> {
		let key = ticket_key(&ticket.principal, Some(&ticket.scheme))?;

		self.tickets.write().insert(key, ticket);

		Ok(())
	}

	/// Current ticket for `subject` under `scheme`.
	pub fn ticket(&self, subject: &str, scheme: Option<&str>) -> Option<AuthenticationTicket> {
		self.tickets
			.read()
			.get(&(subject.to_owned(), scheme.unwrap_or_default().to_owned()))
			.cloned()
	}

	/// Number of `authenticate` calls served so far.
	pub fn authentications(&self) -> usize {
		self.authentications.load(Ordering::SeqCst)
	}

	/// Number of `sign_in` calls served so far.
	pub fn sign_ins(&self) -> usize {
		self.sign_ins.load(Ordering::SeqCst)
	}
}
impl SessionStore for MemorySessionStore {
	fn authenticate<'a>(
		&'a self,
		principal: &'a Principal,
		scheme: Option<&'a str>,
	) -> SessionFuture<'a, Option<AuthenticationTicket>> {
		Box::pin(async move {
			self.authentications.fetch_add(1, Ordering::SeqCst);

			if !principal.is_authenticated() {
				return Ok(None);
			}

			let key = ticket_key(principal, scheme)?;

			Ok(self.tickets.read().get(&key).cloned())
		})
	}

	fn sign_in<'a>(
		&'a self,
		principal: &'a Principal,
		scheme: Option<&'a str>,
		ticket: AuthenticationTicket,
	) -> SessionFuture<'a, ()> {
		Box::pin(async move {
			let key = ticket_key(principal, scheme)?;

			self.sign_ins.fetch_add(1, Ordering::SeqCst);
			self.tickets.write().insert(key, ticket);

			Ok(())
		})
	}

	fn sliding_expiration(&self, _scheme: Option<&str>) -> bool {
		self.sliding_expiration
	}
}

fn ticket_key(principal: &Principal, scheme: Option<&str>) -> Result<TicketKey, SessionError> {
	let subject = principal.subject().ok_or(SessionError::Anonymous)?;

	Ok((subject.to_owned(), scheme.unwrap_or_default().to_owned()))
}
