//! Word packs the board is drawn from.
//!
//! Every pack must hold at least `BOARD_SIZE` distinct upper-case words.

use crate::types::WordPack;

const CLASSIC: &[&str] = &[
    "AFRICA", "AGENT", "ALPS", "AMBULANCE", "ANGEL", "ANTARCTICA", "APPLE", "ARM", "ATLANTIS",
    "AZTEC", "BACK", "BALL", "BAND", "BANK", "BAR", "BARK", "BAT", "BATTERY", "BEACH", "BEAR",
    "BEAT", "BED", "BELL", "BERRY", "BILL", "BLOCK", "BOARD", "BOLT", "BOMB", "BOND", "BOOM",
    "BOOT", "BOTTLE", "BOW", "BOX", "BRIDGE", "BRUSH", "BUCK", "BUFFALO", "BUG", "BUGLE",
    "BUTTON", "CALF", "CANADA", "CAP", "CAPITAL", "CARD", "CASINO", "CAST", "CAT", "CELL",
    "CENTAUR", "CHAIR", "CHANGE", "CHARGE", "CHECK", "CHEST", "CHICK", "CHINA", "CHOCOLATE",
    "CHURCH", "CIRCLE", "CLIFF", "CLOAK", "CLUB", "CODE", "COLD", "COMIC", "COMPOUND", "CONCERT",
    "CONDUCTOR", "CONTRACT", "COOK", "COPPER", "COTTON", "COURT", "COVER", "CRANE", "CRASH",
    "CRICKET", "CROSS", "CROWN", "CYCLE", "CZECH", "DANCE", "DATE", "DAY", "DEATH", "DECK",
    "DEGREE", "DIAMOND", "DICE", "DINOSAUR", "DISEASE", "DOCTOR", "DOG", "DRAFT", "DRAGON",
    "DRESS", "DRILL", "DROP", "DUCK", "DWARF", "EAGLE", "EGYPT", "EMBASSY", "ENGINE", "ENGLAND",
    "EUROPE", "EYE", "FACE", "FAIR", "FALL", "FAN", "FENCE", "FIELD", "FIGHTER", "FIGURE",
    "FILE", "FILM", "FIRE", "FISH", "FLUTE", "FLY", "FOOT", "FORCE", "FOREST", "FORK", "FRANCE",
    "GAME", "GAS", "GENIUS", "GERMANY", "GHOST", "GIANT", "GLASS", "GLOVE", "GOLD", "GRACE",
    "GRASS", "GREECE", "GREEN", "GROUND", "HAM", "HAND", "HAWK", "HEAD", "HEART", "HELICOPTER",
    "HOLE", "HOLLYWOOD", "HONEY", "HOOD", "HOOK", "HORN", "HORSE", "HOSPITAL", "HOTEL", "ICE",
    "INDIA", "IRON", "IVORY", "JACK", "JAM", "JET", "JUPITER", "KANGAROO", "KETCHUP", "KEY",
    "KID", "KING", "KIWI", "KNIFE", "KNIGHT", "LAB", "LAP", "LASER", "LAWYER", "LEAD", "LEMON",
    "LEPRECHAUN", "LIFE", "LIGHT", "LIMOUSINE", "LINE", "LINK", "LION", "LITTER", "LOCK", "LOG",
    "LONDON", "LUCK", "MAIL", "MAMMOTH", "MAPLE", "MARBLE", "MARCH", "MASS", "MATCH", "MERCURY",
    "MEXICO", "MICROSCOPE", "MILLIONAIRE", "MINE", "MINT", "MISSILE", "MODEL", "MOLE", "MOON",
    "MOSCOW", "MOUNT", "MOUSE", "MOUTH", "MUG", "NAIL", "NEEDLE", "NET", "NIGHT", "NINJA",
    "NOTE", "NOVEL", "NURSE", "NUT", "OCTOPUS", "OIL", "OLIVE", "OLYMPUS", "OPERA", "ORANGE",
    "ORGAN", "PALM", "PAN", "PANTS", "PAPER", "PARACHUTE", "PARK", "PART", "PASS", "PASTE",
    "PENGUIN", "PHOENIX", "PIANO", "PIE", "PILOT", "PIN", "PIPE", "PIRATE", "PISTOL", "PIT",
    "PITCH", "PLANE", "PLASTIC", "PLATE", "PLATYPUS", "PLAY", "PLOT", "POINT", "POISON", "POLE",
    "POLICE", "POOL", "PORT", "POST", "PRESS", "PRINCESS", "PUMPKIN", "PUPIL", "PYRAMID",
    "QUEEN", "RABBIT", "RACKET", "RAY", "REVOLUTION", "RING", "ROBIN", "ROBOT", "ROCK", "ROME",
    "ROOT", "ROSE", "ROULETTE", "ROUND", "ROW", "RULER", "SATELLITE", "SATURN", "SCALE",
    "SCHOOL", "SCIENTIST", "SCORPION", "SCREEN", "SCUBA", "SEAL", "SERVER", "SHADOW",
    "SHAKESPEARE", "SHARK", "SHIP", "SHOE", "SHOP", "SHOT", "SINK", "SKYSCRAPER", "SLIP", "SLUG",
    "SMUGGLER", "SNOW", "SNOWMAN", "SOCK", "SOLDIER", "SOUL", "SOUND", "SPACE", "SPELL",
    "SPIDER", "SPIKE", "SPINE", "SPOT", "SPRING", "SPY", "SQUARE", "STADIUM", "STAFF", "STAR",
    "STATE", "STICK", "STOCK", "STRAW", "STREAM", "STRIKE", "STRING", "SUB", "SUIT", "SUPERHERO",
    "SWING", "SWITCH", "TABLE", "TABLET", "TAG", "TAIL", "TAP", "TEACHER", "TELESCOPE", "TEMPLE",
    "THIEF", "THUMB", "TICK", "TIE", "TIME", "TOKYO", "TOOTH", "TORCH", "TOWER", "TRACK", "TRAIN",
    "TRIANGLE", "TRIP", "TRUNK", "TUBE", "TURKEY", "UNDERTAKER", "UNICORN", "VACUUM", "VAN",
    "VET", "WAKE", "WALL", "WAR", "WASHER", "WASHINGTON", "WATCH", "WATER", "WAVE", "WEB", "WELL",
    "WHALE", "WHIP", "WIND", "WITCH", "WORM", "YARD",
];

const NATURE: &[&str] = &[
    "ACORN", "ALGAE", "AVALANCHE", "BADGER", "BAMBOO", "BASIN", "BEAVER", "BIRCH", "BISON",
    "BLIZZARD", "BOULDER", "BRAMBLE", "BREEZE", "BROOK", "CACTUS", "CANYON", "CAVERN", "CEDAR",
    "CLOVER", "COMET", "CORAL", "COYOTE", "CRATER", "CRYSTAL", "CYPRESS", "DAISY", "DELTA",
    "DESERT", "DEW", "DUNE", "ECLIPSE", "ELK", "EMBER", "FALCON", "FERN", "FJORD", "FLOOD",
    "FROST", "FUNGUS", "GALAXY", "GECKO", "GEYSER", "GLACIER", "GORGE", "GRANITE", "GROVE",
    "HAIL", "HARBOR", "HEDGEHOG", "HERON", "HILL", "HURRICANE", "IGLOO", "ISLAND", "IVY",
    "JAGUAR", "JUNGLE", "KELP", "LAGOON", "LAVA", "LICHEN", "LIGHTNING", "LYNX", "MAGMA",
    "MANGROVE", "MARSH", "MEADOW", "METEOR", "MIST", "MONSOON", "MOOSE", "MOSS", "NEBULA",
    "NECTAR", "OAK", "OASIS", "ORCHID", "OTTER", "OWL", "PEBBLE", "PEAK", "PINE", "PLAIN",
    "POLLEN", "PRAIRIE", "PUFFIN", "QUARRY", "RAINBOW", "RAVEN", "REEF", "RIDGE", "RIVER",
    "SALMON", "SEQUOIA", "SHORE", "SLOTH", "SPRUCE", "SQUALL", "SUMMIT", "SWAMP", "THICKET",
    "THUNDER", "TIDE", "TORNADO", "TUNDRA", "TURTLE", "VALLEY", "VOLCANO", "WALRUS", "WILLOW",
    "WOLF", "ZEBRA",
];

impl WordPack {
    pub fn words(self) -> &'static [&'static str] {
        match self {
            WordPack::Classic => CLASSIC,
            WordPack::Nature => NATURE,
        }
    }
}
