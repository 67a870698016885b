pub mod fixture_builder;
