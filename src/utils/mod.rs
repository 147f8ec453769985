pub mod limited_spawner;
pub mod mp3join;
pub mod multierr;
