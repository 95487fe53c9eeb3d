//! Well-known symbol literals used on the wire (spec §6)

use crate::symbol::{symbol, Symbol};

macro_rules! well_known_symbols {
    ($($name:ident => $token:expr),+ $(,)?) => {
        $(
            #[allow(non_snake_case)]
            pub fn $name() -> Symbol {
                symbol($token)
            }
        )+
    };
}

well_known_symbols! {
    mode_social_public => "social_2.0",
    mode_social_private => "social_2.0_private",
    mode_social_npe => "social_2.0_npe",
    mode_arena_public => "echo_arena",
    mode_arena_private => "echo_arena_private",
    mode_arena_tournament => "echo_arena_tournament",
    mode_arena_public_ai => "echo_arena_public_ai",
    mode_combat_public => "echo_combat",
    mode_combat_private => "echo_combat_private",
    mode_combat_tournament => "echo_combat_tournament",
    level_social => "mpl_lobby_b2",
    level_arena => "mpl_arena_a",
    level_arena_tutorial => "mpl_tutorial_arena",
    level_combat_fission => "mpl_combat_fission",
    level_combat_combustion => "mpl_combat_combustion",
    level_combat_dyson => "mpl_combat_dyson",
    level_combat_gauss => "mpl_combat_gauss",
}
