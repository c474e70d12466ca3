//! Compile-time defaults, merged by build.rs from library values and the
//! optional `UT_CONFIG_RS` user file.

include!(concat!(env!("OUT_DIR"), "/ut_merged_config.rs"));
