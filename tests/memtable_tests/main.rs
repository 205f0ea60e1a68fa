//! In-memory ordered map tests
