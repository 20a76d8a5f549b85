pub mod inventory_record;
