//! Hard caps on state growth and request size. Exceeding any of these is a
//! client error, not a capacity plan.

/// Max fields in one deployment.
pub const MAX_FIELDS: usize = 10_000;

/// Max length of a field name.
pub const MAX_NAME_LEN: usize = 256;

/// Max length of a customer contact field (name, email, phone).
pub const MAX_CONTACT_LEN: usize = 256;

/// Max length of a client-supplied idempotency key.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// Max bookings (any status) retained per field per calendar date.
pub const MAX_BOOKINGS_PER_DAY: usize = 1_000;

/// Max dates accepted in one block/unblock request.
pub const MAX_DATES_PER_REQUEST: usize = 366;

/// Max time slots accepted in one block/unblock request.
pub const MAX_SLOTS_PER_REQUEST: usize = 48;

/// Max permitted booking lengths advertised on a field.
pub const MAX_ALLOWED_DURATIONS: usize = 16;

/// Longest bookable duration: 12 hours.
pub const MAX_DURATION_MIN: u32 = 720;

/// Candidate start times are generated on this grid.
pub const SLOT_STEP_MIN: u16 = 60;

/// Blocked time slots and booking durations align to this granularity.
pub const BLOCK_GRANULARITY_MIN: u16 = 30;
