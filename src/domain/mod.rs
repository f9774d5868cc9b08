// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that name the concepts
// of the system: expression classes, dataset rows and splits.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// The seven expression classes
pub mod emotion;

// A parsed dataset row and its usage split
pub mod record;

// Core abstractions (traits) that other layers implement
pub mod traits;
