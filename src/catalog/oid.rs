pub type Oid = u32;

// Well-known pg_type oids, stable since time immemorial. Only the handful
// the analyzer and its tests reach for by name; everything else flows
// through the loaded snapshot.
pub const BOOL_OID: Oid = 16;
pub const INT8_OID: Oid = 20;
pub const INT2_OID: Oid = 21;
pub const INT4_OID: Oid = 23;
pub const TEXT_OID: Oid = 25;
pub const FLOAT4_OID: Oid = 700;
pub const FLOAT8_OID: Oid = 701;
