//! GPIO pin assignments (BCM numbering).

/// Shift-register register-clock (RCLK) strobe.
pub const SHIFTREG_RCLK_PIN: usize = 25;

/// MCP3008 chip select (active low).
pub const ADC_CS_PIN: usize = 8;

/// Number of addressable GPIO lines on the 40-pin header.
pub const GPIO_PIN_COUNT: usize = 28;
