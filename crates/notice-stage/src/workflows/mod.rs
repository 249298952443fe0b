pub mod stage_change;
