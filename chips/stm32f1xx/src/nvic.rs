// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Named constants for NVIC ids

#![allow(non_upper_case_globals)]

pub const WWDG: u32 = 0;
pub const PVD: u32 = 1;
pub const TAMPER: u32 = 2;
pub const RTC: u32 = 3;
pub const FLASH: u32 = 4;
pub const RCC: u32 = 5;
pub const EXTI0: u32 = 6;
pub const EXTI1: u32 = 7;
pub const EXTI2: u32 = 8;
pub const EXTI3: u32 = 9;
pub const EXTI4: u32 = 10;
pub const DMA1_Channel1: u32 = 11;
pub const DMA1_Channel2: u32 = 12;
pub const DMA1_Channel3: u32 = 13;
pub const DMA1_Channel4: u32 = 14;
pub const DMA1_Channel5: u32 = 15;
pub const DMA1_Channel6: u32 = 16;
pub const DMA1_Channel7: u32 = 17;
pub const ADC1_2: u32 = 18;
pub const HP_USB_OR_CAN1_TX: u32 = 19;
pub const LP_USB_OR_CAN1_RX0: u32 = 20;
pub const CAN1_RX1: u32 = 21;
pub const CAN1_SCE: u32 = 22;
pub const EXTI9_5: u32 = 23;
pub const TIM1_BRK: u32 = 24;
pub const TIM1_UP: u32 = 25;
pub const TIM1_TRG_COM: u32 = 26;
pub const TIM1_CC: u32 = 27;
pub const TIM2: u32 = 28;
pub const TIM3: u32 = 29;
pub const TIM4: u32 = 30;
pub const I2C1_EV: u32 = 31;
pub const I2C1_ER: u32 = 32;
pub const I2C2_EV: u32 = 33;
pub const I2C2_ER: u32 = 34;
pub const SPI1: u32 = 35;
pub const SPI2: u32 = 36;
pub const USART1: u32 = 37;
pub const USART2: u32 = 38;
pub const USART3: u32 = 39;
pub const EXTI15_10: u32 = 40;
pub const RTC_Alarm: u32 = 41;
pub const USB_OR_OTG_FS_WKUP: u32 = 42;
pub const TIM8_BRK: u32 = 43;
pub const TIM8_UP: u32 = 44;
pub const TIM8_TRG_COM: u32 = 45;
pub const TIM8_CC: u32 = 46;
pub const ADC3: u32 = 47;
pub const FSMC: u32 = 48;
pub const SDIO: u32 = 49;
pub const TIM5: u32 = 50;
pub const SPI3: u32 = 51;
pub const UART4: u32 = 52;
pub const UART5: u32 = 53;
pub const TIM6: u32 = 54;
pub const TIM7: u32 = 55;
pub const DMA2_Channel1: u32 = 56;
pub const DMA2_Channel2: u32 = 57;
pub const DMA2_Channel3: u32 = 58;
/// Shared by channels 4 and 5 on high density devices
pub const DMA2_Channel4_5: u32 = 59;
/// Connectivity line only; channel 4 keeps IRQ 59 alone
pub const DMA2_Channel5: u32 = 60;
pub const ETH: u32 = 61;
pub const ETH_WKUP: u32 = 62;
pub const CAN2_TX: u32 = 63;
pub const CAN2_RX0: u32 = 64;
pub const CAN2_RX1: u32 = 65;
pub const CAN2_SCE: u32 = 66;
pub const OTG_FS: u32 = 67;

/// Priority bits implemented by the STM32F1 NVIC
pub const PRIORITY_BITS: u8 = 4;

/// AIRCR PRIGROUP value giving all four bits to preemption, no sub-priority
pub const PRIORITY_GROUPING: u8 = 3;

/// Preemption levels used across the system. Lower is more urgent.
pub mod priority {
    pub const HIGHEST: u8 = 0;
    pub const LEVEL_1: u8 = 1;
    pub const LEVEL_2: u8 = 2;
    pub const LEVEL_3: u8 = 3;
    pub const LEVEL_4: u8 = 4;
    pub const LEVEL_5: u8 = 5;
    pub const LEVEL_6: u8 = 6;
    pub const LEVEL_7: u8 = 7;
    pub const LEVEL_8: u8 = 8;
    pub const LEVEL_9: u8 = 9;
    pub const LEVEL_10: u8 = 10;
    pub const LEVEL_11: u8 = 11;
    pub const LEVEL_12: u8 = 12;
    pub const NORMAL: u8 = 13;
    pub const LOW: u8 = 14;
    pub const LOWEST: u8 = 15;
}
