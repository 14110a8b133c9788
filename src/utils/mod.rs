pub mod db_utils;
pub mod workspace_cache;
